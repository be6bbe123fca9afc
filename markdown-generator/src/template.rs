//! Markdown fragments with `{{name}}` placeholders.
//!
//! A template is checked against the variables its caller supplies before
//! anything is substituted: the number of `{{` and of `}}` must equal the number
//! of variables, and the sorted placeholder names must equal the sorted
//! variable names.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::debug;
use regex::{Captures, Regex};
use thiserror::Error;

const START_DELIMITER: &str = "{{";
const END_DELIMITER: &str = "}}";

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").unwrap());

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {name} not found")]
    NotFound { name: String },

    #[error("could not read template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "template {name} does not match its caller: {supplied} variable(s) supplied, \
         {opening} '{{{{' and {closing} '}}}}' delimiter(s) found"
    )]
    VariableCount {
        name: String,
        supplied: usize,
        opening: usize,
        closing: usize,
    },

    #[error("template {name} expects variables {found:?} but was given {supplied:?}")]
    VariableNames {
        name: String,
        supplied: Vec<String>,
        found: Vec<String>,
    },

    #[error("required {name} template variable '{variable}' not specified")]
    MissingValue { name: String, variable: String },

    #[error("no code examples to insert into template {name}")]
    EmptyCodeExamples { name: String },
}

pub type Result<T> = std::result::Result<T, TemplateError>;

/// Where template files come from.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    dir: Option<PathBuf>,
}

impl TemplateSet {
    /// Templates compiled into the crate.
    pub fn embedded() -> Self {
        Self { dir: None }
    }

    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
        }
    }

    pub fn raw(&self, name: &str) -> Result<String> {
        match &self.dir {
            Some(dir) => {
                let path = dir.join(name);
                debug!("Loading template {}", path.display());
                fs::read_to_string(&path).map_err(|source| TemplateError::Io { path, source })
            }
            None => embedded_template(name)
                .map(str::to_string)
                .ok_or_else(|| TemplateError::NotFound {
                    name: name.to_string(),
                }),
        }
    }

    /// A template with no placeholders.
    pub fn fixed(&self, name: &str) -> Result<Template> {
        self.load(name, BTreeMap::new(), false)
    }

    pub fn load(
        &self,
        name: &str,
        variables: BTreeMap<&str, String>,
        fail_on_missing_value: bool,
    ) -> Result<Template> {
        let raw = self.raw(name)?;
        let variables = variables
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Template::new(name, raw, variables, fail_on_missing_value)
    }
}

fn embedded_template(name: &str) -> Option<&'static str> {
    let content = match name {
        "header.md" => include_str!("../templates/header.md"),
        "introduction.md" => include_str!("../templates/introduction.md"),
        "warnings.md" => include_str!("../templates/warnings.md"),
        "examples-setup.md" => include_str!("../templates/examples-setup.md"),
        "authentication.md" => include_str!("../templates/authentication.md"),
        "grpc-service.md" => include_str!("../templates/grpc-service.md"),
        "rpc-method.md" => include_str!("../templates/rpc-method.md"),
        "rpc-message.md" => include_str!("../templates/rpc-message.md"),
        "message-enum.md" => include_str!("../templates/message-enum.md"),
        "global-enum.md" => include_str!("../templates/global-enum.md"),
        "message-fields.md" => include_str!("../templates/message-fields.md"),
        "grpc-messages.md" => include_str!("../templates/grpc-messages.md"),
        "grpc-enums.md" => include_str!("../templates/grpc-enums.md"),
        "message.md" => include_str!("../templates/message.md"),
        "errors.md" => include_str!("../templates/errors.md"),
        _ => return None,
    };
    Some(content)
}

#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    raw: String,
    variables: BTreeMap<String, String>,
}

impl Template {
    /// Validates `raw` against `variables`. A blank value is an error when
    /// `fail_on_missing_value` is set, and an empty string otherwise.
    pub fn new(
        name: &str,
        raw: String,
        mut variables: BTreeMap<String, String>,
        fail_on_missing_value: bool,
    ) -> Result<Self> {
        let opening = count_delimiter(&raw, START_DELIMITER);
        let closing = count_delimiter(&raw, END_DELIMITER);
        if opening != variables.len() || closing != variables.len() {
            return Err(TemplateError::VariableCount {
                name: name.to_string(),
                supplied: variables.len(),
                opening,
                closing,
            });
        }

        let mut found: Vec<String> = PLACEHOLDER_REGEX
            .captures_iter(&raw)
            .map(|c| c[1].trim().to_string())
            .collect();
        found.sort();
        let supplied: Vec<String> = variables.keys().cloned().collect();
        if found != supplied {
            return Err(TemplateError::VariableNames {
                name: name.to_string(),
                supplied,
                found,
            });
        }

        for (variable, value) in variables.iter_mut() {
            if value.trim().is_empty() {
                if fail_on_missing_value {
                    return Err(TemplateError::MissingValue {
                        name: name.to_string(),
                        variable: variable.clone(),
                    });
                }
                value.clear();
            }
        }

        Ok(Self {
            name: name.to_string(),
            raw,
            variables,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw text when there is nothing to substitute; otherwise the
    /// substituted text, trimmed and followed by one blank line.
    pub fn content(&self) -> String {
        if self.variables.is_empty() {
            return self.raw.clone();
        }
        let resolved = PLACEHOLDER_REGEX.replace_all(&self.raw, |caps: &Captures| {
            self.variables
                .get(caps[1].trim())
                .cloned()
                .unwrap_or_default()
        });
        format!("{}\n\n", resolved.trim())
    }

    /// `content()` with `examples` spliced in after its first line, verbatim.
    pub fn content_with_code_examples(&self, examples: &str) -> Result<String> {
        if examples.trim().is_empty() {
            return Err(TemplateError::EmptyCodeExamples {
                name: self.name.clone(),
            });
        }
        let mut content = self.content();
        let at = content.find('\n').map_or(0, |i| i + 1);
        content.insert_str(at, examples);
        content.push('\n');
        Ok(content)
    }
}

/// Counts occurrences, overlapping ones included.
fn count_delimiter(text: &str, delimiter: &str) -> usize {
    let mut count = 0;
    let mut from = 0;
    while let Some(i) = text[from..].find(delimiter) {
        count += 1;
        from += i + 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_and_trims() {
        let t = Template::new(
            "t.md",
            "\n## {{service.name}}\n\n{{service.description}}\n\n\n".to_string(),
            vars(&[("service.name", "Offers"), ("service.description", "Offer rpcs.")]),
            false,
        )
        .unwrap();
        assert_eq!(t.content(), "## Offers\n\nOffer rpcs.\n\n");
    }

    #[test]
    fn no_variables_means_raw_content() {
        let raw = "# Errors\n\nSomething  \n".to_string();
        let t = Template::new("errors.md", raw.clone(), BTreeMap::new(), true).unwrap();
        assert_eq!(t.content(), raw);
    }

    #[test]
    fn extra_variable_is_rejected_before_substitution() {
        let err = Template::new("t.md", "{{x}}".to_string(), vars(&[("x", "1"), ("y", "2")]), false)
            .unwrap_err();
        assert!(matches!(
            err,
            TemplateError::VariableCount { supplied: 2, opening: 1, closing: 1, .. }
        ));
    }

    #[test]
    fn missing_variable_is_rejected() {
        let err = Template::new("t.md", "{{x}} {{y}}".to_string(), vars(&[("x", "1")]), false)
            .unwrap_err();
        assert!(matches!(err, TemplateError::VariableCount { .. }));
    }

    #[test]
    fn mismatched_names_are_rejected() {
        let err = Template::new("t.md", "{{x}} {{z}}".to_string(), vars(&[("x", "1"), ("y", "2")]), false)
            .unwrap_err();
        match err {
            TemplateError::VariableNames { supplied, found, .. } => {
                assert_eq!(supplied, vec!["x", "y"]);
                assert_eq!(found, vec!["x", "z"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn blank_value_depends_on_strictness() {
        let lenient = Template::new("t.md", "a{{x}}b".to_string(), vars(&[("x", "  ")]), false).unwrap();
        assert_eq!(lenient.content(), "ab\n\n");
        let strict = Template::new("t.md", "a{{x}}b".to_string(), vars(&[("x", "")]), true);
        assert!(matches!(strict, Err(TemplateError::MissingValue { ref variable, .. }) if variable == "x"));
    }

    #[test]
    fn placeholder_whitespace_is_ignored() {
        let t = Template::new("t.md", "{{ x }}".to_string(), vars(&[("x", "1")]), false).unwrap();
        assert_eq!(t.content(), "1\n\n");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let t = Template::new("t.md", "{{x}}".to_string(), vars(&[("x", "$1 {{y}}")]), false).unwrap();
        assert_eq!(t.content(), "$1 {{y}}\n\n");
    }

    #[test]
    fn code_examples_go_after_the_first_line() {
        let t = Template::new(
            "rpc-method.md",
            "### RPC Method {{method.name}}\n\n{{method.description}}\n".to_string(),
            vars(&[("method.name", "GetFoo"), ("method.description", "Gets foo.")]),
            false,
        )
        .unwrap();
        let content = t.content_with_code_examples("```shell\n```\n").unwrap();
        assert_eq!(content, "### RPC Method GetFoo\n```shell\n```\n\nGets foo.\n\n\n");
        assert!(matches!(
            t.content_with_code_examples(" \n"),
            Err(TemplateError::EmptyCodeExamples { .. })
        ));
    }

    #[test]
    fn embedded_templates_are_complete() {
        let set = TemplateSet::embedded();
        for name in [
            "header.md",
            "introduction.md",
            "warnings.md",
            "examples-setup.md",
            "authentication.md",
            "grpc-messages.md",
            "grpc-enums.md",
            "errors.md",
        ] {
            assert!(set.fixed(name).is_ok(), "{name}");
        }
        assert!(matches!(set.raw("nope.md"), Err(TemplateError::NotFound { .. })));
    }

    #[test]
    fn directory_templates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("message.md"), "## {{message.name}}\n{{message.description}}\n").unwrap();
        let set = TemplateSet::from_dir(dir.path());
        let mut variables = BTreeMap::new();
        variables.insert("message.name", "Offer".to_string());
        variables.insert("message.description", "An offer.".to_string());
        let t = set.load("message.md", variables, true).unwrap();
        assert_eq!(t.content(), "## Offer\nAn offer.\n\n");
        assert!(matches!(set.raw("missing.md"), Err(TemplateError::Io { .. })));
    }
}
