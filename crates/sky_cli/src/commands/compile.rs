//! Compile command - Turn a graph document into Terraform configuration.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use sky_iac::{GraphCompiler, ResourceGraph};
use sky_policy::Auditor;

use super::engine::EngineArgs;
use crate::ExitCodes;

#[derive(Args)]
pub struct CompileArgs {
    /// Graph document (JSON or YAML)
    graph: PathBuf,

    /// Write the configuration here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Value of the Environment tag
    #[arg(long)]
    environment: Option<String>,

    /// Audit the generated configuration and print findings
    #[arg(long)]
    audit: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

pub async fn execute(args: CompileArgs) -> Result<u8> {
    info!("Compiling graph: {:?}", args.graph);

    if !args.graph.exists() {
        anyhow::bail!("Graph file not found: {:?}", args.graph);
    }

    let config = args.engine.load_config()?;
    let mut options = config.compiler.clone();
    if let Some(environment) = &args.environment {
        options = options.with_environment(environment);
    }

    let graph = ResourceGraph::from_file(&args.graph)?;
    let compiled = GraphCompiler::default().with_options(options).compile_graph(&graph)?;
    let text = compiled.text();

    for id in compiled.placeholders() {
        warn!("Node {} has an unsupported kind; emitted as a placeholder comment", id);
    }

    match &args.output {
        Some(path) => {
            fs::write(path, &text).with_context(|| format!("Failed to write {:?}", path))?;
            eprintln!("Wrote {} resource(s) to {:?}", compiled.resource_count(), path);
        }
        None => print!("{}", text),
    }

    if args.audit {
        let report = Auditor::standard()?.audit(&text);
        eprintln!("{}", report.report());
    }

    Ok(ExitCodes::SUCCESS)
}
