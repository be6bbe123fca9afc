use std::path::PathBuf;

/// How far the dependency cache follows field types from each rpc message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClosureMode {
    /// Every message reachable through fields, union alternatives and map values.
    #[default]
    Full,
    /// Two message levels below each seed plus one below a union alternative.
    /// Kept for output parity with older documents.
    Shallow,
}

/// Inputs of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Directory holding both .proto files.
    pub protos_in: PathBuf,
    /// Directory the document is written to.
    pub markdown_out: PathBuf,
    pub structure_file: String,
    pub service_file: String,
    /// Template directory; `None` uses the templates built into the crate.
    pub templates: Option<PathBuf>,
    /// Root of the cli-examples, java-examples and python-examples directories.
    pub examples_root: Option<PathBuf>,
    pub fail_on_missing_documentation: bool,
    pub closure: ClosureMode,
    /// Messages whose name contains this are always in the appendix. Empty disables.
    pub payload_marker: String,
    pub document_name: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            protos_in: PathBuf::from("proto"),
            markdown_out: PathBuf::from("."),
            structure_file: "pb.proto".to_string(),
            service_file: "grpc.proto".to_string(),
            templates: None,
            examples_root: None,
            fail_on_missing_documentation: false,
            closure: ClosureMode::Full,
            payload_marker: "AccountPayload".to_string(),
            document_name: "index.html.md".to_string(),
        }
    }
}

impl GeneratorConfig {
    pub fn structure_path(&self) -> PathBuf {
        self.protos_in.join(&self.structure_file)
    }

    pub fn service_path(&self) -> PathBuf {
        self.protos_in.join(&self.service_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.markdown_out.join(&self.document_name)
    }
}
