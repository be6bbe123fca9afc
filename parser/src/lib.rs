mod block;
mod comment;
mod error;
mod line;
mod model;
mod reader;
mod resolver;

use std::path::Path;

use log::debug;

pub use block::{Block, BlockKind};
pub use error::{ParseError, Result};
pub use line::{LineKind, classify};
pub use model::*;
pub use reader::SourceReader;
pub use resolver::{Resolver, with_descriptions};

/// Reads a .proto file into its top-level blocks.
pub fn read_blocks_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Block>> {
    let mut reader = SourceReader::open(path)?;
    block::read_blocks(&mut reader)
}

pub fn read_blocks_from_str(name: &str, text: &str) -> Result<Vec<Block>> {
    let mut reader = SourceReader::from_text(name, text);
    block::read_blocks(&mut reader)
}

/// Parses the structure file and then the service file into one model.
///
/// Messages and enums from both files go into the same tables before any rpc
/// method is resolved, so a service may use messages declared in either file.
pub fn parse_definitions<P: AsRef<Path>, Q: AsRef<Path>>(
    structure_path: P,
    service_path: Q,
    strict: bool,
) -> Result<ApiModel> {
    let structure_blocks = read_blocks_from_file(structure_path)?;
    let service_blocks = read_blocks_from_file(service_path)?;

    let mut resolver = Resolver::new(strict);
    resolver.add_definitions(&structure_blocks)?;
    resolver.add_definitions(&service_blocks)?;
    let model = resolver.resolve_services(&service_blocks)?;

    debug!(
        "Parsed {} enums, {} messages, {} services",
        model.enums.len(),
        model.structures.len(),
        model.services.len()
    );
    Ok(model)
}
