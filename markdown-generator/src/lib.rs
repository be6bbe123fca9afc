mod code_examples;
mod config;
mod dependency;
mod error;
mod render;
mod table;
mod template;

use std::fs;
use std::path::PathBuf;

use apidoc_parser::parse_definitions;
use log::info;

pub use code_examples::{CodeExamples, python_module_name};
pub use config::{ClosureMode, GeneratorConfig};
pub use dependency::DependencyCache;
pub use error::{GenerateError, Result};
pub use render::Renderer;
pub use table::{SlateTable, enum_table, field_table, internal_link};
pub use template::{Template, TemplateError, TemplateSet};

/// Parses both .proto files named by `config` and renders the whole document.
pub fn generate_markdown(config: &GeneratorConfig) -> Result<String> {
    let model = parse_definitions(
        config.structure_path(),
        config.service_path(),
        config.fail_on_missing_documentation,
    )?;
    let templates = match &config.templates {
        Some(dir) => TemplateSet::from_dir(dir),
        None => TemplateSet::embedded(),
    };
    Renderer::new(&model, &templates, config).render()
}

/// Renders the document and writes it to the configured output path.
/// Nothing is written when any step fails.
pub fn write_markdown(config: &GeneratorConfig) -> Result<PathBuf> {
    let markdown = generate_markdown(config)?;
    fs::create_dir_all(&config.markdown_out)
        .map_err(|source| GenerateError::io(&config.markdown_out, source))?;
    let path = config.output_path();
    fs::write(&path, markdown).map_err(|source| GenerateError::io(&path, source))?;
    info!("Wrote {}", path.display());
    Ok(path)
}
