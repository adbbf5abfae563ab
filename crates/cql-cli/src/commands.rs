use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cql")]
#[command(about = "Compiles CQL fixture programs to a schema JSON or a query-plan program", long_about = None, version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(name = "json", about = "Analyze a fixture AST and emit the JSON schema")]
    Json(AnalyzeArgs),
    #[command(
        name = "query-plan",
        about = "Analyze a fixture AST and emit the synthesized query-plan report"
    )]
    QueryPlan(AnalyzeArgs),
}

#[derive(Debug, Parser)]
pub struct AnalyzeArgs {
    /// Fixture JSON file (see `cql_cli::fixture`). Use `-` to read from stdin.
    pub path: PathBuf,
    /// Convert hex-lexeme integer literals to decimal in JSON output.
    #[arg(long, default_value = "false")]
    pub convert_hex: bool,
}
