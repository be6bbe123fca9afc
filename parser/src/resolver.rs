//! Turns block trees into the semantic model.
//!
//! Passes one and two (`add_definitions`) load top-level enums and messages
//! from the structure file and then from the service file. Pass three
//! (`resolve_services`) consumes the resolver, freezes the tables and resolves
//! every rpc method against them.

use std::collections::BTreeMap;
use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

use crate::block::{Block, BlockKind};
use crate::error::{ParseError, Result};
use crate::line;
use crate::model::*;

/// Pairs every definition block with the description attached to it.
///
/// A comment immediately before a definition is its description. License
/// headers and header statements reset the pending comment.
pub fn with_descriptions(blocks: &[Block]) -> Vec<(&Block, String)> {
    let mut pending: Option<String> = None;
    let mut described = Vec::new();
    for block in blocks {
        if block.is_license() {
            pending = None;
        } else if let Some(comment) = block.comment() {
            pending = Some(comment);
        } else if block.kind() == BlockKind::Header {
            pending = None;
        } else {
            described.push((block, pending.take().unwrap_or_default()));
        }
    }
    described
}

#[derive(Debug, Default)]
pub struct Resolver {
    strict: bool,
    enums: BTreeMap<String, Rc<EnumDefinition>>,
    structures: BTreeMap<String, Rc<StructureDefinition>>,
}

impl Resolver {
    /// `strict` turns a missing description on a top-level definition or rpc
    /// method into an error.
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            ..Self::default()
        }
    }

    /// Adds the top-level enums and messages of one file. Services are left
    /// for `resolve_services`.
    pub fn add_definitions(&mut self, blocks: &[Block]) -> Result<()> {
        for (block, description) in with_descriptions(blocks) {
            match block.kind() {
                BlockKind::Enum => {
                    let definition = self.build_enum(block, description, true)?;
                    self.check_strict("enum", &definition.name, &definition.description)?;
                    self.check_unique(&definition.name)?;
                    debug!("Resolved enum {}", definition.name);
                    self.enums.insert(definition.name.clone(), Rc::new(definition));
                }
                BlockKind::Message => {
                    let definition = self.build_structure(block, description)?;
                    self.check_strict("message", &definition.name, &definition.description)?;
                    self.check_unique(&definition.name)?;
                    debug!("Resolved message {}", definition.name);
                    self.structures
                        .insert(definition.name.clone(), Rc::new(definition));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Resolves the services of `blocks` against everything added so far.
    pub fn resolve_services(self, blocks: &[Block]) -> Result<ApiModel> {
        self.check_field_types()?;

        let mut services: BTreeMap<String, ServiceDefinition> = BTreeMap::new();
        for (block, description) in with_descriptions(blocks) {
            if block.kind() != BlockKind::Service {
                continue;
            }
            let service = self.build_service(block, description)?;
            if services.contains_key(&service.name) {
                return Err(ParseError::DuplicateDefinition {
                    kind: "service",
                    name: service.name,
                });
            }
            debug!(
                "Resolved service {} with {} method(s)",
                service.name,
                service.methods.len()
            );
            services.insert(service.name.clone(), service);
        }

        Ok(ApiModel {
            enums: self.enums,
            structures: self.structures,
            services,
        })
    }

    fn check_strict(&self, kind: &'static str, name: &str, description: &str) -> Result<()> {
        if self.strict && description.trim().is_empty() {
            return Err(ParseError::MissingDescription {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn check_unique(&self, name: &str) -> Result<()> {
        if let Some(kind) = self.kind_of(name) {
            return Err(ParseError::DuplicateDefinition {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn kind_of(&self, name: &str) -> Option<&'static str> {
        if self.enums.contains_key(name) {
            Some("enum")
        } else if self.structures.contains_key(name) {
            Some("message")
        } else {
            None
        }
    }

    // ---------------- Enums ----------------

    fn build_enum(&self, block: &Block, description: String, is_global: bool) -> Result<EnumDefinition> {
        let name = line::parse_declared_name(block.head())?;
        let mut constants = IndexMap::new();
        for (child, description) in with_descriptions(block.children()) {
            if child.kind() != BlockKind::EnumConstant {
                continue;
            }
            let tokens = line::parse_enum_constant(child.head())?;
            if constants.contains_key(&tokens.name) {
                return Err(ParseError::DuplicateDefinition {
                    kind: "enum constant",
                    name: format!("{name}.{}", tokens.name),
                });
            }
            constants.insert(
                tokens.name,
                EnumConstant {
                    value: tokens.value,
                    description,
                    deprecated: tokens.deprecated,
                },
            );
        }
        Ok(EnumDefinition {
            name,
            constants,
            description,
            is_global,
        })
    }

    // ---------------- Messages ----------------

    fn build_structure(&self, block: &Block, description: String) -> Result<StructureDefinition> {
        let name = line::parse_declared_name(block.head())?;
        let mut structure = StructureDefinition {
            name,
            enums: IndexMap::new(),
            fields: IndexMap::new(),
            description,
        };

        for (child, description) in with_descriptions(block.children()) {
            match child.kind() {
                BlockKind::Enum => {
                    let nested = self.build_enum(child, description, false)?;
                    if structure.enums.contains_key(&nested.name) {
                        return Err(ParseError::DuplicateDefinition {
                            kind: "enum",
                            name: format!("{}.{}", structure.name, nested.name),
                        });
                    }
                    structure.enums.insert(nested.name.clone(), nested);
                }
                BlockKind::Field => {
                    let field = typed_field(child, description)?;
                    insert_field(&mut structure, field.name.clone(), field)?;
                }
                BlockKind::MapField => {
                    let tokens = line::parse_map_field(child.head())?;
                    let field = FieldDefinition {
                        name: tokens.name,
                        kind: FieldKind::Map {
                            key_type: FieldType::from_name(&tokens.key_type),
                            value_type: FieldType::from_name(&tokens.value_type),
                        },
                        ordinal: tokens.number,
                        description,
                        deprecated: tokens.deprecated,
                    };
                    insert_field(&mut structure, field.name.clone(), field)?;
                }
                BlockKind::ReservedField => {
                    for range in line::parse_reserved(child.head())? {
                        let key = format!("{RESERVED_FIELD_KEY_PREFIX}{}", range.start());
                        let field = FieldDefinition {
                            name: key.clone(),
                            kind: FieldKind::Reserved { end: *range.end() },
                            ordinal: *range.start(),
                            description: description.clone(),
                            deprecated: false,
                        };
                        insert_field(&mut structure, key, field)?;
                    }
                }
                BlockKind::Oneof => {
                    if structure.fields.contains_key(ONEOF_FIELD_KEY) {
                        return Err(ParseError::MultipleOneofFields {
                            structure: structure.name,
                        });
                    }
                    let field = oneof_field(child, description)?;
                    structure.fields.insert(ONEOF_FIELD_KEY.to_string(), field);
                }
                _ => {}
            }
        }
        Ok(structure)
    }

    /// Every custom field type must name a top-level definition, an enum
    /// nested in the same message, or `Message.Enum`.
    fn check_field_types(&self) -> Result<()> {
        for structure in self.structures.values() {
            for field in structure.fields.values() {
                for type_name in field.referenced_types() {
                    if !self.is_resolvable(structure, type_name) {
                        return Err(ParseError::UnresolvedFieldType {
                            structure: structure.name.clone(),
                            field: field.name.clone(),
                            type_name: type_name.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn is_resolvable(&self, owner: &StructureDefinition, type_name: &str) -> bool {
        if owner.has_local_enum(type_name)
            || lookup(&self.structures, type_name).is_some()
            || lookup(&self.enums, type_name).is_some()
        {
            return true;
        }
        let qualified = type_name.strip_prefix('.').unwrap_or(type_name);
        match qualified.rsplit_once('.') {
            Some((outer, inner)) => {
                lookup(&self.structures, outer).is_some_and(|s| s.has_local_enum(inner))
            }
            None => false,
        }
    }

    // ---------------- Services ----------------

    fn build_service(&self, block: &Block, description: String) -> Result<ServiceDefinition> {
        let name = line::parse_declared_name(block.head())?;
        self.check_strict("service", &name, &description)?;
        let mut methods = IndexMap::new();
        for (child, description) in with_descriptions(block.children()) {
            if child.kind() != BlockKind::RpcMethod {
                continue;
            }
            let method = self.build_rpc_method(child, description)?;
            if methods.contains_key(&method.name) {
                return Err(ParseError::DuplicateDefinition {
                    kind: "rpc method",
                    name: format!("{name}.{}", method.name),
                });
            }
            methods.insert(method.name.clone(), method);
        }
        Ok(ServiceDefinition {
            name,
            methods,
            description,
        })
    }

    fn build_rpc_method(&self, block: &Block, description: String) -> Result<RpcMethodDefinition> {
        let tokens = line::parse_rpc(block.head())?;
        self.check_strict("rpc method", &tokens.name, &description)?;
        let resolve = |type_name: &str| {
            lookup(&self.structures, type_name)
                .cloned()
                .ok_or_else(|| ParseError::UnresolvedReference {
                    method: tokens.name.clone(),
                    type_name: type_name.to_string(),
                })
        };
        Ok(RpcMethodDefinition {
            request: resolve(&tokens.request)?,
            response: resolve(&tokens.response)?,
            name: tokens.name,
            description,
        })
    }
}

fn typed_field(block: &Block, description: String) -> Result<FieldDefinition> {
    let tokens = line::parse_field(block.head())?;
    Ok(FieldDefinition {
        name: tokens.name,
        kind: FieldKind::Typed {
            declared_type: FieldType::from_name(&tokens.type_name),
            repeated: tokens.repeated,
        },
        ordinal: tokens.number,
        description,
        deprecated: tokens.deprecated,
    })
}

fn oneof_field(block: &Block, description: String) -> Result<FieldDefinition> {
    let name = line::parse_declared_name(block.head())?;
    let alternatives = with_descriptions(block.children())
        .into_iter()
        .filter(|(child, _)| child.kind() == BlockKind::OneofField)
        .map(|(child, description)| typed_field(child, description))
        .collect::<Result<Vec<_>>>()?;
    Ok(FieldDefinition {
        name,
        kind: FieldKind::Oneof { alternatives },
        ordinal: ONEOF_ORDINAL,
        description,
        deprecated: false,
    })
}

fn insert_field(structure: &mut StructureDefinition, key: String, field: FieldDefinition) -> Result<()> {
    if structure.fields.contains_key(&key) {
        return Err(ParseError::DuplicateDefinition {
            kind: "field",
            name: format!("{}.{}", structure.name, key),
        });
    }
    structure.fields.insert(key, field);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_blocks_from_str;

    fn model(structures: &str, services: &str) -> Result<ApiModel> {
        model_with(structures, services, false)
    }

    fn model_with(structures: &str, services: &str, strict: bool) -> Result<ApiModel> {
        let pb = read_blocks_from_str("pb.proto", structures)?;
        let grpc = read_blocks_from_str("grpc.proto", services)?;
        let mut resolver = Resolver::new(strict);
        resolver.add_definitions(&pb)?;
        resolver.add_definitions(&grpc)?;
        resolver.resolve_services(&grpc)
    }

    #[test]
    fn preceding_comment_is_the_description() {
        let model = model("// the Foo message\nmessage Foo {\n  string name = 1;\n}\n", "").unwrap();
        let foo = &model.structures["Foo"];
        assert_eq!(foo.description, "the Foo message");
        assert_eq!(foo.fields.len(), 1);
        let name = &foo.fields["name"];
        assert_eq!(name.declared_type(), Some(&FieldType::Scalar(ScalarType::String)));
        assert_eq!(name.ordinal, 1);
        assert!(!name.is_repeated());
    }

    #[test]
    fn no_comment_means_empty_description() {
        let model = model("message Foo {\n}\n", "").unwrap();
        assert_eq!(model.structures["Foo"].description, "");
    }

    #[test]
    fn license_header_is_not_a_description() {
        let src = "/*\n * Licensed under the AGPL License.\n */\nmessage Foo {\n}\n";
        let model = model(src, "").unwrap();
        assert_eq!(model.structures["Foo"].description, "");
    }

    #[test]
    fn header_statement_resets_pending_comment() {
        let src = "// file level\nsyntax = \"proto3\";\nmessage Foo {\n}\n";
        assert_eq!(model(src, "").unwrap().structures["Foo"].description, "");
    }

    #[test]
    fn oneof_is_stored_under_sentinel_key() {
        let src = r#"
            message Choice {
                string id = 1;
                // Which side.
                oneof choice {
                    // A buy.
                    Buy buy = 5;
                    Sell sell = 6;
                }
            }
            message Buy {
            }
            message Sell {
            }
        "#;
        let model = model(src, "").unwrap();
        let choice = &model.structures["Choice"];
        let oneof = choice.oneof().unwrap();
        assert_eq!(oneof.name, "choice");
        assert_eq!(oneof.ordinal, -1);
        assert_eq!(oneof.description, "Which side.");
        assert!(oneof.declared_type().is_none());
        let alternatives = oneof.alternatives();
        assert_eq!(alternatives.len(), 2);
        assert_eq!(alternatives[0].name, "buy");
        assert_eq!(alternatives[0].description, "A buy.");
        assert_eq!(alternatives[1].ordinal, 6);
    }

    #[test]
    fn second_oneof_is_rejected() {
        let src = "message M {\n oneof a {\n  string x = 1;\n }\n oneof b {\n  string y = 2;\n }\n}\n";
        assert!(matches!(
            model(src, ""),
            Err(ParseError::MultipleOneofFields { ref structure }) if structure == "M"
        ));
    }

    #[test]
    fn nested_enums_maps_and_reserved_slots() {
        let src = r#"
            message Offer {
                enum Direction {
                    BUY = 0;
                    // Selling.
                    SELL = 1 [deprecated = true];
                }
                Direction direction = 1;
                map<string, int64> fees = 2;
                reserved 3 to 4;
            }
        "#;
        let model = model(src, "").unwrap();
        let offer = &model.structures["Offer"];
        let direction = &offer.enums["Direction"];
        assert!(!direction.is_global);
        assert_eq!(direction.constants["SELL"].value, 1);
        assert_eq!(direction.constants["SELL"].description, "Selling.");
        assert!(direction.constants["SELL"].deprecated);
        assert!(offer.fields["fees"].is_map());
        let reserved = &offer.fields["reserved_field_number_3"];
        assert!(reserved.is_reserved());
        assert_eq!(reserved.ordinal, 3);
        assert_eq!(reserved.reserved_numbers().as_deref(), Some("3 to 4"));
        assert!(!offer.fields.contains_key("reserved_field_number_4"));
        assert!(model.enums.is_empty());
    }

    #[test]
    fn rpc_methods_share_table_entries() {
        let pb = "message GetFooRequest {\n}\nmessage GetFooReply {\n  string foo = 1;\n}\n";
        let grpc = "service Foos {\n  rpc GetFoo (GetFooRequest) returns (GetFooReply) {\n  }\n}\n";
        let model = model(pb, grpc).unwrap();
        let method = &model.services["Foos"].methods["GetFoo"];
        assert!(Rc::ptr_eq(&method.request, &model.structures["GetFooRequest"]));
        assert!(Rc::ptr_eq(&method.response, &model.structures["GetFooReply"]));
    }

    #[test]
    fn service_file_messages_resolve_too() {
        let grpc = r#"
            // Bar service.
            service Bars {
                // Gets a bar.
                rpc GetBar (GetBarRequest) returns (.io.example.GetBarReply);
            }
            message GetBarRequest {
            }
            message GetBarReply {
            }
        "#;
        let model = model("", grpc).unwrap();
        let service = &model.services["Bars"];
        assert_eq!(service.description, "Bar service.");
        assert_eq!(service.methods["GetBar"].description, "Gets a bar.");
        assert_eq!(service.methods["GetBar"].response.name, "GetBarReply");
    }

    #[test]
    fn unknown_rpc_type_is_unresolved() {
        let pb = "message GetBarRequest {\n}\n";
        let grpc = "service Bars {\n  rpc GetBar (GetBarRequest) returns (GetBarReply) {\n  }\n}\n";
        match model(pb, grpc) {
            Err(ParseError::UnresolvedReference { method, type_name }) => {
                assert_eq!(method, "GetBar");
                assert_eq!(type_name, "GetBarReply");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn unknown_field_type_is_unresolved() {
        let pb = "message A {\n  Missing m = 1;\n}\n";
        assert!(matches!(
            model(pb, ""),
            Err(ParseError::UnresolvedFieldType { ref type_name, .. }) if type_name == "Missing"
        ));
    }

    #[test]
    fn qualified_nested_enum_resolves() {
        let pb = "message A {\n  enum Kind {\n    X = 0;\n  }\n}\nmessage B {\n  A.Kind kind = 1;\n}\n";
        assert!(model(pb, "").is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let pb = "enum Foo {\n  A = 0;\n}\nmessage Foo {\n}\n";
        assert!(matches!(
            model(pb, ""),
            Err(ParseError::DuplicateDefinition { kind: "enum", .. })
        ));
        let fields = "message M {\n  string a = 1;\n  int32 a = 2;\n}\n";
        assert!(matches!(
            model(fields, ""),
            Err(ParseError::DuplicateDefinition { kind: "field", .. })
        ));
    }

    #[test]
    fn wide_reserved_ranges_are_one_slot_each() {
        let pb = "message A {\n  reserved 2, 1000 to 536870911;\n}\nmessage B {\n  reserved 5 to max;\n}\n";
        let model = model(pb, "").unwrap();
        let a = &model.structures["A"];
        assert_eq!(a.fields.len(), 2);
        assert_eq!(
            a.fields["reserved_field_number_1000"].kind,
            FieldKind::Reserved { end: MAX_FIELD_NUMBER }
        );
        let b = &model.structures["B"];
        assert_eq!(b.fields.len(), 1);
        assert_eq!(
            b.fields["reserved_field_number_5"].reserved_numbers().as_deref(),
            Some("5 to max")
        );
    }

    #[test]
    fn reserved_number_past_max_is_malformed() {
        let pb = "message A {\n  reserved 1 to 536870912;\n}\n";
        assert!(matches!(model(pb, ""), Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn duplicate_services_are_rejected() {
        let grpc = "service S {\n}\nservice S {\n}\n";
        match model("", grpc) {
            Err(ParseError::DuplicateDefinition { kind, name }) => {
                assert_eq!(kind, "service");
                assert_eq!(name, "S");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn duplicate_rpc_methods_are_rejected() {
        let grpc = "message R {\n}\nservice S {\n  rpc Get (R) returns (R);\n  rpc Get (R) returns (R) {\n  }\n}\n";
        match model("", grpc) {
            Err(ParseError::DuplicateDefinition { kind, name }) => {
                assert_eq!(kind, "rpc method");
                assert_eq!(name, "S.Get");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn strict_mode_requires_descriptions() {
        let pb = "// Documented.\nmessage A {\n}\nmessage B {\n}\n";
        assert!(model_with(pb, "", false).is_ok());
        match model_with(pb, "", true) {
            Err(ParseError::MissingDescription { kind, name }) => {
                assert_eq!(kind, "message");
                assert_eq!(name, "B");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn global_enums_are_flagged() {
        let model = model("enum Side {\n  BUY = 0;\n  SELL = 1;\n}\n", "").unwrap();
        let side = &model.enums["Side"];
        assert!(side.is_global);
        assert_eq!(side.constants.keys().collect::<Vec<_>>(), vec!["BUY", "SELL"]);
    }
}
