//! Classification and decomposition of single .proto lines.
//!
//! Comments are recognized here by prefix; everything else goes through the
//! pest grammar in `resources/line.pest`.

use std::ops::RangeInclusive;

use pest::Parser as _;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::error::{ParseError, Result};
use crate::model::MAX_FIELD_NUMBER;

#[derive(Parser)]
#[grammar = "resources/line.pest"] // Path relative to src/
pub struct LineParser;

const LINE_COMMENT: &str = "//";
const BLOCK_COMMENT_OPEN: &str = "/*";
const BLOCK_COMMENT_CLOSE: &str = "*/";

/// The shape of one trimmed line, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    LineComment,
    BlockComment,
    CloseBrace,
    MapField,
    OneofOpen,
    ReservedField,
    EnumOpen,
    MessageOpen,
    ServiceOpen,
    RpcOpen,
    RpcInline,
    Syntax,
    Package,
    Import,
    Option,
    Field,
    EnumConstant,
}

impl LineKind {
    fn from_rule(rule: Rule) -> Option<Self> {
        let kind = match rule {
            Rule::close_brace => LineKind::CloseBrace,
            Rule::map_field => LineKind::MapField,
            Rule::oneof_open => LineKind::OneofOpen,
            Rule::reserved_field => LineKind::ReservedField,
            Rule::enum_open => LineKind::EnumOpen,
            Rule::message_open => LineKind::MessageOpen,
            Rule::service_open => LineKind::ServiceOpen,
            Rule::rpc_open => LineKind::RpcOpen,
            Rule::rpc_inline => LineKind::RpcInline,
            Rule::syntax_stmt => LineKind::Syntax,
            Rule::package_stmt => LineKind::Package,
            Rule::import_stmt => LineKind::Import,
            Rule::option_stmt => LineKind::Option,
            Rule::field => LineKind::Field,
            Rule::enum_constant => LineKind::EnumConstant,
            _ => return None,
        };
        Some(kind)
    }
}

pub fn is_line_comment(line: &str) -> bool {
    line.starts_with(LINE_COMMENT)
}

pub fn is_block_comment_opener(line: &str) -> bool {
    line.starts_with(BLOCK_COMMENT_OPEN)
}

pub fn is_block_comment_closer(line: &str) -> bool {
    line.ends_with(BLOCK_COMMENT_CLOSE)
}

/// Classifies a trimmed line. `None` means the line matches no known shape.
pub fn classify(line: &str) -> Option<LineKind> {
    if is_line_comment(line) {
        return Some(LineKind::LineComment);
    }
    if is_block_comment_opener(line) {
        return Some(LineKind::BlockComment);
    }
    let mut pairs = LineParser::parse(Rule::line, line).ok()?;
    let statement = pairs.next()?.into_inner().next()?;
    LineKind::from_rule(statement.as_rule())
}

/// Splits a `// ...` comment appended to a declaration off the line.
/// Slashes inside string literals are not comments.
pub fn split_trailing_comment(line: &str) -> (&str, Option<&str>) {
    if is_line_comment(line) || is_block_comment_opener(line) {
        return (line, None);
    }
    let mut quote: Option<char> = None;
    let mut prev_slash = false;
    for (idx, ch) in line.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '/' && prev_slash => {
                let start = idx - 1;
                return (line[..start].trim_end(), Some(line[start..].trim()));
            }
            None => {}
        }
        prev_slash = quote.is_none() && ch == '/';
    }
    (line, None)
}

// ---------------- Decomposition ----------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTokens {
    pub repeated: bool,
    pub type_name: String,
    pub name: String,
    pub number: i32,
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapFieldTokens {
    pub key_type: String,
    pub value_type: String,
    pub name: String,
    pub number: i32,
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstantTokens {
    pub name: String,
    pub value: i32,
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcTokens {
    pub name: String,
    pub request: String,
    pub response: String,
}

fn parse_statement(line: &str, expected: Rule) -> Result<Pair<'_, Rule>> {
    let mut pairs = LineParser::parse(Rule::line, line).map_err(Box::new)?;
    let statement = pairs
        .next()
        .and_then(|l| l.into_inner().next())
        .ok_or_else(|| ParseError::malformed(line, "empty statement"))?;
    if statement.as_rule() != expected {
        return Err(ParseError::malformed(
            line,
            format!("expected {:?}, found {:?}", expected, statement.as_rule()),
        ));
    }
    Ok(statement)
}

fn inner_str(pair: &Pair<'_, Rule>, rule: Rule) -> Option<String> {
    pair.clone()
        .into_inner()
        .find(|p| p.as_rule() == rule)
        .map(|p| p.as_str().trim().to_string())
}

fn required(pair: &Pair<'_, Rule>, rule: Rule, line: &str) -> Result<String> {
    inner_str(pair, rule).ok_or_else(|| ParseError::malformed(line, format!("missing {:?}", rule)))
}

fn is_deprecated(pair: &Pair<'_, Rule>) -> bool {
    pair.clone()
        .into_inner()
        .filter(|p| p.as_rule() == Rule::field_options)
        .flat_map(|p| p.into_inner())
        .any(|option| {
            let mut parts = option.into_inner();
            let name = parts.next().map(|p| p.as_str());
            let value = parts.next().map(|p| p.as_str());
            name == Some("deprecated") && value == Some("true")
        })
}

/// Parses a decimal or hex integer literal with an optional minus sign.
pub fn parse_integer_value(s: &str) -> Option<i64> {
    let (neg, rest) = match s.strip_prefix('-') {
        Some(stripped) => (true, stripped),
        None => (false, s),
    };
    let val = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        rest.parse::<i64>().ok()?
    };
    Some(if neg { -val } else { val })
}

fn field_number(text: &str, line: &str) -> Result<i32> {
    parse_integer_value(text)
        .and_then(|n| i32::try_from(n).ok())
        .filter(|n| (1..=MAX_FIELD_NUMBER).contains(n))
        .ok_or_else(|| ParseError::malformed(line, format!("invalid field number '{text}'")))
}

pub fn parse_field(line: &str) -> Result<FieldTokens> {
    let pair = parse_statement(line, Rule::field)?;
    let repeated = inner_str(&pair, Rule::label).is_some_and(|l| l == "repeated");
    Ok(FieldTokens {
        repeated,
        type_name: required(&pair, Rule::field_type, line)?,
        name: required(&pair, Rule::field_name, line)?,
        number: field_number(&required(&pair, Rule::field_number, line)?, line)?,
        deprecated: is_deprecated(&pair),
    })
}

pub fn parse_map_field(line: &str) -> Result<MapFieldTokens> {
    let pair = parse_statement(line, Rule::map_field)?;
    Ok(MapFieldTokens {
        key_type: required(&pair, Rule::map_key_type, line)?,
        value_type: required(&pair, Rule::map_value_type, line)?,
        name: required(&pair, Rule::field_name, line)?,
        number: field_number(&required(&pair, Rule::field_number, line)?, line)?,
        deprecated: is_deprecated(&pair),
    })
}

pub fn parse_enum_constant(line: &str) -> Result<EnumConstantTokens> {
    let pair = parse_statement(line, Rule::enum_constant)?;
    let raw_value = required(&pair, Rule::constant_value, line)?;
    let value = parse_integer_value(&raw_value)
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| ParseError::malformed(line, format!("invalid enum value '{raw_value}'")))?;
    Ok(EnumConstantTokens {
        name: required(&pair, Rule::constant_name, line)?,
        value,
        deprecated: is_deprecated(&pair),
    })
}

/// Returns the field number ranges retired by a `reserved` line, in source
/// order. A single number is a one-number range; `max` is the largest field
/// number. Reserved names yield no ranges.
pub fn parse_reserved(line: &str) -> Result<Vec<RangeInclusive<i32>>> {
    let pair = parse_statement(line, Rule::reserved_field)?;
    let mut ranges = Vec::new();
    for range in pair.into_inner().filter(|p| p.as_rule() == Rule::reserved_range) {
        let mut bounds = Vec::with_capacity(2);
        for bound in range.into_inner() {
            match bound.as_rule() {
                Rule::reserved_number => bounds.push(field_number(bound.as_str(), line)?),
                Rule::reserved_max => bounds.push(MAX_FIELD_NUMBER),
                _ => {}
            }
        }
        match bounds.as_slice() {
            [single] => ranges.push(*single..=*single),
            [start, end] if start <= end => ranges.push(*start..=*end),
            _ => return Err(ParseError::malformed(line, "invalid reserved range")),
        }
    }
    Ok(ranges)
}

pub fn parse_rpc(line: &str) -> Result<RpcTokens> {
    let pair = match parse_statement(line, Rule::rpc_open) {
        Ok(pair) => pair,
        Err(_) => parse_statement(line, Rule::rpc_inline)?,
    };
    let type_of = |rule: Rule| -> Result<String> {
        pair.clone()
            .into_inner()
            .find(|p| p.as_rule() == rule)
            .and_then(|p| p.into_inner().find(|x| x.as_rule() == Rule::full_ident))
            .map(|p| p.as_str().to_string())
            .ok_or_else(|| ParseError::malformed(line, format!("missing {:?}", rule)))
    };
    Ok(RpcTokens {
        name: required(&pair, Rule::declared_name, line)?,
        request: type_of(Rule::request_type)?,
        response: type_of(Rule::response_type)?,
    })
}

/// Name declared by an `enum`, `message`, `service` or `oneof` opening line.
pub fn parse_declared_name(line: &str) -> Result<String> {
    let kind = classify(line).ok_or_else(|| ParseError::malformed(line, "not a declaration"))?;
    let rule = match kind {
        LineKind::EnumOpen => Rule::enum_open,
        LineKind::MessageOpen => Rule::message_open,
        LineKind::ServiceOpen => Rule::service_open,
        LineKind::OneofOpen => Rule::oneof_open,
        _ => return Err(ParseError::malformed(line, "not a named declaration")),
    };
    let pair = parse_statement(line, rule)?;
    required(&pair, Rule::declared_name, line)
}
