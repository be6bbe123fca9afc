//! Per-method example snippets, found by file name.
//!
//! For a method `GetFoo` under the examples root:
//! `cli-examples/GetFoo.sh`, `java-examples/GetFoo.java` and
//! `python-examples/get_foo.py`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{GenerateError, Result};

const CLI_EXAMPLES_DIR: &str = "cli-examples";
const JAVA_EXAMPLES_DIR: &str = "java-examples";
const PYTHON_EXAMPLES_DIR: &str = "python-examples";
const JAVA_BOILERPLATE: &str = "BaseJavaExample.java";

const START_SHELL: &str = "```shell";
const START_JAVA: &str = "```java";
const START_PYTHON: &str = "```python";
const END_SAMPLE: &str = "```";

static UPPERCASE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([A-Z])").unwrap());

#[derive(Debug, Clone)]
pub struct CodeExamples {
    root: PathBuf,
}

impl CodeExamples {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn cli_path(&self, method: &str) -> PathBuf {
        self.root.join(CLI_EXAMPLES_DIR).join(format!("{method}.sh"))
    }

    pub fn java_path(&self, method: &str) -> PathBuf {
        self.root.join(JAVA_EXAMPLES_DIR).join(format!("{method}.java"))
    }

    pub fn python_path(&self, method: &str) -> PathBuf {
        self.root
            .join(PYTHON_EXAMPLES_DIR)
            .join(format!("{}.py", python_module_name(method)))
    }

    pub fn exist(&self, method: &str) -> bool {
        self.cli_path(method).is_file()
            || self.java_path(method).is_file()
            || self.python_path(method).is_file()
    }

    /// Three fenced blocks (shell, java, python), or `None` when the method
    /// has no example in any language.
    pub fn content(&self, method: &str) -> Result<Option<String>> {
        if !self.exist(method) {
            return Ok(None);
        }
        let mut s = String::new();

        s.push_str(START_SHELL);
        s.push('\n');
        if let Some(source) = read_if_present(&self.cli_path(method))? {
            // `source` lines only set up the script's environment.
            for line in source.lines().filter(|l| !l.starts_with("source ")) {
                s.push_str(line);
                s.push('\n');
            }
            s.push('\n');
        }
        s.push_str(END_SAMPLE);
        s.push_str("\n\n");

        s.push_str(START_JAVA);
        s.push('\n');
        if let Some(source) = read_if_present(&self.java_path(method))? {
            let displayed = source.trim();
            s.push_str(displayed);
            s.push('\n');
            if displayed.lines().count() > 1
                && let Some(boilerplate) = self.java_boilerplate()?
            {
                s.push('\n');
                s.push_str("//////////////////\n");
                s.push_str("// BaseJavaExample\n");
                s.push_str("//////////////////\n");
                s.push('\n');
                s.push_str(boilerplate.trim());
                s.push_str("\n\n");
            }
        }
        s.push_str(END_SAMPLE);
        s.push('\n');

        s.push_str(START_PYTHON);
        s.push('\n');
        if let Some(source) = read_if_present(&self.python_path(method))? {
            s.push_str(source.trim());
            s.push('\n');
        }
        s.push_str(END_SAMPLE);
        s.push('\n');

        Ok(Some(s))
    }

    fn java_boilerplate(&self) -> Result<Option<String>> {
        read_if_present(&self.root.join(JAVA_EXAMPLES_DIR).join(JAVA_BOILERPLATE))
    }
}

/// `GetXmrPrice` -> `get_xmr_price`.
pub fn python_module_name(method: &str) -> String {
    let mut chars = method.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest = UPPERCASE_REGEX.replace_all(chars.as_str(), "_$1");
    format!("{}{}", first.to_lowercase(), rest.to_lowercase())
}

fn read_if_present(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(|source| GenerateError::io(path, source))
}
