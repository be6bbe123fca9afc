//! Slate flavoured markdown tables.
//!
//! Slate wants tables without the leading and trailing `|` of GitHub tables:
//!
//! ```text
//!  Name | Type | Description
//!  ------------- | ------------- | -------------
//!  id | string | The offer id.
//! ```

use apidoc_parser::{
    ApiModel, EnumDefinition, FieldDefinition, FieldKind, FieldType, StructureDefinition,
    simple_type_name,
};

const SEPARATOR: &str = "|";
const TITLE_RULE: &str = "-------------";
const HTML_LINE_BREAK: &str = "</br>";

const NBSP: &str = "&nbsp;";
const BEGIN_ONEOF: &str = "one of {";
const END_ONEOF: &str = "}";
const ONEOF_DEFAULT_DESCRIPTION: &str = "Field value will be one of the following.";
const RESERVED: &str = "reserved";
const DEPRECATED: &str = "Deprecated.";

#[derive(Debug, Clone, Default)]
pub struct SlateTable {
    titles: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SlateTable {
    pub fn new(titles: &[&str]) -> Self {
        Self {
            titles: titles.iter().map(|t| t.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, columns: Vec<String>) {
        self.rows.push(columns);
    }

    pub fn to_markdown(&self) -> String {
        let mut s = encode_line(self.titles.iter().map(String::as_str));
        s.push_str(&encode_line(self.titles.iter().map(|_| TITLE_RULE)));
        for row in &self.rows {
            // A raw newline inside a cell ends the table row.
            let cells: Vec<String> = row.iter().map(|c| c.replace('\n', HTML_LINE_BREAK)).collect();
            s.push_str(&encode_line(cells.iter().map(String::as_str)));
        }
        s.push('\n');
        s
    }
}

fn encode_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let mut s = cells
        .map(|c| format!(" {c} "))
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    s.push('\n');
    s
}

/// `[label](#name)` pointing at a definition's section.
pub fn internal_link(label: &str, type_name: &str) -> String {
    format!("[{}](#{})", label, simple_type_name(type_name).to_lowercase())
}

fn describe(description: &str, deprecated: bool) -> String {
    match (deprecated, description.trim().is_empty()) {
        (false, _) => description.to_string(),
        (true, true) => DEPRECATED.to_string(),
        (true, false) => format!("{DEPRECATED} {description}"),
    }
}

/// Table of a message's fields: Name, Type and Description.
pub fn field_table(structure: &StructureDefinition, model: &ApiModel) -> String {
    let mut table = SlateTable::new(&["Name", "Type", "Description"]);
    for field in structure.fields.values() {
        match &field.kind {
            FieldKind::Typed { declared_type, repeated } => {
                let label = decorated_type(declared_type, *repeated);
                let linked = match declared_type.custom_name() {
                    Some(name) if !structure.has_local_enum(name) && model.is_known_type(name) => {
                        internal_link(&label, name)
                    }
                    _ => label,
                };
                table.push_row(vec![
                    field.name.clone(),
                    linked,
                    describe(&field.description, field.deprecated),
                ]);
            }
            FieldKind::Map { key_type, value_type } => {
                let value = match value_type.custom_name() {
                    Some(name) if model.is_known_type(name) => internal_link(name, name),
                    _ => value_type.to_string(),
                };
                table.push_row(vec![
                    field.name.clone(),
                    format!("map&#60;{key_type}, {value}&#62;"),
                    describe(&field.description, field.deprecated),
                ]);
            }
            FieldKind::Oneof { alternatives } => {
                push_oneof_rows(&mut table, field, alternatives, model);
            }
            FieldKind::Reserved { .. } => {
                table.push_row(vec![
                    RESERVED.to_string(),
                    field.reserved_numbers().unwrap_or_default(),
                    field.description.clone(),
                ]);
            }
        }
    }
    table.to_markdown()
}

fn push_oneof_rows(
    table: &mut SlateTable,
    oneof: &FieldDefinition,
    alternatives: &[FieldDefinition],
    model: &ApiModel,
) {
    let description = if oneof.description.trim().is_empty() {
        ONEOF_DEFAULT_DESCRIPTION.to_string()
    } else {
        oneof.description.clone()
    };
    table.push_row(vec![BEGIN_ONEOF.to_string(), NBSP.to_string(), description]);

    let mut sorted: Vec<&FieldDefinition> = alternatives.iter().collect();
    sorted.sort_by_key(|f| f.declared_type().map(ToString::to_string).unwrap_or_default());
    let indent = NBSP.repeat(4);
    for alternative in sorted {
        let type_column = match alternative.declared_type() {
            Some(FieldType::Custom(name)) if model.is_known_type(name) => internal_link(name, name),
            Some(declared) => declared.to_string(),
            None => String::new(),
        };
        table.push_row(vec![
            format!("{indent}{}", alternative.name),
            type_column,
            describe(&alternative.description, alternative.deprecated),
        ]);
    }

    table.push_row(vec![END_ONEOF.to_string(), NBSP.to_string(), NBSP.to_string()]);
}

fn decorated_type(declared_type: &FieldType, repeated: bool) -> String {
    if repeated {
        format!("array of {declared_type}")
    } else {
        declared_type.to_string()
    }
}

/// Table of an enum's constants: Constant, Value and Description.
pub fn enum_table(definition: &EnumDefinition) -> String {
    let mut table = SlateTable::new(&["Constant", "Value", "Description"]);
    for (name, constant) in &definition.constants {
        table.push_row(vec![
            name.clone(),
            constant.value.to_string(),
            describe(&constant.description, constant.deprecated),
        ]);
    }
    table.to_markdown()
}
