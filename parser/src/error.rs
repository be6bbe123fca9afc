use std::path::PathBuf;

use thiserror::Error;

use crate::line::Rule;

/// Every failure while turning .proto text into definitions. None of them is
/// recoverable: the whole generation run is aborted.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reached end of {source_name} while reading")]
    UnexpectedEof { source_name: String },

    #[error("'{opening}' is not closed before end of {source_name}")]
    Unclosed {
        source_name: String,
        opening: String,
    },

    #[error("invalid text in '{context}': {line}")]
    Structural { context: String, line: String },

    #[error("could not parse line '{line}': {reason}")]
    Malformed { line: String, reason: String },

    #[error("unbalanced braces in {source_name}: {detail}")]
    Nesting { source_name: String, detail: String },

    #[error("rpc method '{method}' references undeclared message '{type_name}'")]
    UnresolvedReference { method: String, type_name: String },

    #[error("field '{structure}.{field}' references undeclared type '{type_name}'")]
    UnresolvedFieldType {
        structure: String,
        field: String,
        type_name: String,
    },

    #[error("duplicate {kind} definition '{name}'")]
    DuplicateDefinition { kind: &'static str, name: String },

    #[error("message '{structure}' declares more than one oneof field")]
    MultipleOneofFields { structure: String },

    #[error("{kind} '{name}' has no description comment")]
    MissingDescription { kind: &'static str, name: String },

    #[error("parse error: {0}")]
    Pest(#[from] Box<pest::error::Error<Rule>>),
}

impl ParseError {
    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        ParseError::Malformed {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn structural(context: &str, line: &str) -> Self {
        ParseError::Structural {
            context: context.to_string(),
            line: line.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
