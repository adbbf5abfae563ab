//! CLI driver (component J, SPEC_FULL.md supplement over spec.md's core-only
//! scope): loads a fixture AST (`fixture` module, standing in for the
//! out-of-scope real parser per spec §6), runs the analyzer, and dispatches
//! to the `cql-json` or `cql-queryplan` backend.

pub mod commands;
pub mod fixture;
mod logger;

use std::io::Read as _;

use clap::Parser as _;
use cql_lib::{CompilationContext, CompileOptions};

use crate::commands::{AnalyzeArgs, Cli, Commands};

pub fn run_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    logger::init();
    let cli = Cli::parse_from(args);
    match cli.command {
        Commands::Json(args) => run_json(args),
        Commands::QueryPlan(args) => run_query_plan(args),
    }
}

fn read_source(args: &AnalyzeArgs) -> anyhow::Result<String> {
    if args.path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(&args.path)?)
    }
}

fn build_context(args: &AnalyzeArgs) -> anyhow::Result<CompilationContext> {
    let source = read_source(args)?;
    let options = CompileOptions {
        convert_hex: args.convert_hex,
        ..CompileOptions::default()
    };
    let mut ctx = CompilationContext::new(options);
    let source_name = args.path.to_string_lossy().to_string();
    let root = fixture::load(&mut ctx.arena, &source_name, &source)?;
    cql_lib::analyzer::analyze(&mut ctx, root);
    Ok(ctx)
}

fn run_json(args: AnalyzeArgs) -> i32 {
    let ctx = match build_context(&args) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("cql: {e}");
            return 1;
        }
    };
    match cql_json::to_json_string(&ctx) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            eprintln!("cql: {e}");
            1
        }
    }
}

fn run_query_plan(args: AnalyzeArgs) -> i32 {
    let ctx = match build_context(&args) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("cql: {e}");
            return 1;
        }
    };
    let options = cql_queryplan::PlanOptions::default();
    match cql_queryplan::to_json_string(&ctx, &options) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            eprintln!("cql: {e}");
            1
        }
    }
}
