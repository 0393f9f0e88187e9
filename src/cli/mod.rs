// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses the command line with `clap` and routes each subcommand
// to its Layer 2 use case. The only output printed here is the
// short result summary; progress goes through `tracing`.

pub mod commands;

use std::fs;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};

use crate::application::{
    characterizer::{export_records, Characterizer, CharacterizerConfig},
    concept_use_case::ConceptUseCase,
    evaluate_use_case::EvaluateUseCase,
    export_use_case::ExportUseCase,
    import_use_case::ImportUseCase,
    parse_use_case::ParseUseCase,
    train_use_case::TrainUseCase,
};
use crate::data::split_store::read_samples;
use commands::{CharacterizeArgs, Commands};

#[derive(Parser, Debug)]
#[command(
    name = "self-explain",
    version,
    about = "Build balanced datasets, train self-explaining classifiers and explain their predictions."
)]
pub struct Cli {
    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log directive for the crate at this verbosity.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "self_explain=warn",
            1 => "self_explain=info",
            _ => "self_explain=debug",
        }
    }

    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Import(args) => {
                let written = ImportUseCase::new(args.into()).execute()?;
                for path in written {
                    println!("{}", path.display());
                }
            }
            Commands::ParseTrees(args) => {
                let written = ParseUseCase::new(args.into()).execute()?;
                println!("Staged {} parse-tree files.", written.len());
            }
            Commands::BuildConcepts(args) => {
                let output = args.output.clone();
                let concepts = ConceptUseCase::new(args.into()).execute()?;
                println!("Wrote {} concepts to {}", concepts.len(), output.display());
            }
            Commands::Train(args) => {
                TrainUseCase::new(args.into()).execute()?;
                println!("Training complete. Checkpoint saved.");
            }
            Commands::Evaluate(args) => {
                let summary = EvaluateUseCase::new(args.into()).execute()?;
                println!("Accuracy: {:.2}% ({}/{})", summary.accuracy() * 100.0, summary.correct, summary.evaluated);
            }
            Commands::Characterize(args) => run_characterize(&args)?,
            Commands::Export(args) => {
                let manifest = ExportUseCase::new(args.into()).execute()?;
                println!("{}", manifest.display());
            }
        }
        Ok(())
    }
}

/// Characterize every text of a TSV file, one score line per text.
fn run_characterize(args: &CharacterizeArgs) -> Result<()> {
    let mut texts = read_samples(&args.input)?;
    if let Some(n) = args.number {
        texts.truncate(n);
    }

    let mut characterizer = Characterizer::load(&CharacterizerConfig::from(args))?;
    let mut results = Vec::with_capacity(texts.len());
    for (i, text) in texts.iter().enumerate() {
        let result = characterizer.process(&text.sentence, args.batch_size, text.label)?;
        if result.is_empty() {
            tracing::warn!("text {} has no sentences", i);
        }
        println!("{i}\t{:.4}\t{}", result.score, text.label);
        results.push(result);
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&export_records(&results))?;
        fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::info!("wrote evidence for {} texts to {}", results.len(), path.display());
    }
    Ok(())
}
