use std::path::PathBuf;
use std::process::ExitCode;

use apidoc_markdown::{ClosureMode, GeneratorConfig, write_markdown};
use clap::{Parser, ValueEnum};
use log::debug;

/// Generates a Slate markdown API reference from pb.proto and grpc.proto.
#[derive(Debug, Parser)]
#[clap(name = "proto-apidoc", version)]
struct Args {
    /// Directory holding the .proto files.
    #[clap(long, default_value = "proto")]
    protos_in: PathBuf,

    /// Directory the document is written to.
    #[clap(long, default_value = ".")]
    markdown_out: PathBuf,

    #[clap(long, default_value = "pb.proto")]
    structure_file: String,

    #[clap(long, default_value = "grpc.proto")]
    service_file: String,

    /// Template directory. The built-in templates are used when omitted.
    #[clap(long)]
    templates: Option<PathBuf>,

    /// Directory with cli-examples, java-examples and python-examples.
    #[clap(long)]
    examples_root: Option<PathBuf>,

    /// Fail when a service, rpc method, message or enum has no description.
    #[clap(long)]
    fail_on_missing_documentation: bool,

    #[clap(long, value_enum, default_value = "full")]
    closure: Closure,

    /// Messages whose name contains this always get an appendix section.
    #[clap(long, default_value = "AccountPayload")]
    payload_marker: String,

    #[clap(long, default_value = "index.html.md")]
    document_name: String,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Closure {
    Full,
    Shallow,
}

impl From<Closure> for ClosureMode {
    fn from(closure: Closure) -> Self {
        match closure {
            Closure::Full => ClosureMode::Full,
            Closure::Shallow => ClosureMode::Shallow,
        }
    }
}

impl From<Args> for GeneratorConfig {
    fn from(args: Args) -> Self {
        GeneratorConfig {
            protos_in: args.protos_in,
            markdown_out: args.markdown_out,
            structure_file: args.structure_file,
            service_file: args.service_file,
            templates: args.templates,
            examples_root: args.examples_root,
            fail_on_missing_documentation: args.fail_on_missing_documentation,
            closure: args.closure.into(),
            payload_marker: args.payload_marker,
            document_name: args.document_name,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = GeneratorConfig::from(args);
    debug!("{config:?}");
    write_markdown(&config)?;
    Ok(())
}
