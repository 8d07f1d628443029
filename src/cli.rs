//! Command-line arguments shared by the pipeline binaries

use crate::config::PipelineConfig;
use crate::pipeline::{PipelineRunner, Stage, StageReport};
use crate::store::{ArtifactPaths, DEFAULT_ROOT};
use anyhow::Context;
use clap::{Args, Parser};
use std::path::PathBuf;

/// Options every entry point accepts
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Artifact root containing data/, reports/ and models/
    #[arg(long, global = true, default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// JSON configuration file; absent fields keep their defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl CommonArgs {
    /// Resolve configuration and build a runner rooted at `--root`
    pub fn runner(&self) -> anyhow::Result<PipelineRunner> {
        let config = PipelineConfig::resolve(self.config.as_deref()).with_context(|| match &self.config {
            Some(p) => format!("loading configuration from {}", p.display()),
            None => "resolving default configuration".to_string(),
        })?;
        Ok(PipelineRunner::new(ArtifactPaths::new(&self.root), config))
    }
}

/// Arguments of a single-stage binary
#[derive(Parser, Debug)]
#[command(version, about = "Run one stage of the customer scoring pipeline", long_about = None)]
pub struct StageArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Print one "Saved:" line per artifact the stage wrote
pub fn print_saved(report: &StageReport) {
    for path in &report.outputs {
        println!("Saved: {}", path.display());
    }
}

/// Body of every `src/bin/<stage>.rs`
pub fn run_stage_binary(stage: Stage) -> anyhow::Result<()> {
    env_logger::init();
    let args = StageArgs::parse();
    let runner = args.common.runner()?;
    let report = runner
        .run(stage)
        .with_context(|| format!("stage {} ({}) failed", stage.number(), stage))?;
    print_saved(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = StageArgs::try_parse_from(["score_final"]).unwrap();
        assert_eq!(args.common.root, PathBuf::from("."));
        assert!(args.common.config.is_none());
    }

    #[test]
    fn test_root_and_config() {
        let args = StageArgs::try_parse_from(["x", "--root", "/tmp/run", "--config", "c.json"]).unwrap();
        assert_eq!(args.common.root, PathBuf::from("/tmp/run"));
        assert_eq!(args.common.config, Some(PathBuf::from("c.json")));
    }
}
