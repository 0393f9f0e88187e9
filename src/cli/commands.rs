// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// One clap `Args` struct per subcommand. Each converts into the
// matching application config with a `From` impl, so Layer 2
// never sees clap types.
//
//   import <source>   raw corpus → split TSVs
//   parse-trees       split TSVs → tokenizer + parse trees
//   build-concepts    train split → concept map
//   train             parsed splits → checkpoint
//   evaluate          checkpoint + parsed file → TSV report
//   characterize      checkpoint + texts → scores and evidence
//   export            checkpoint → versioned model bundle

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{
    characterizer::CharacterizerConfig,
    concept_use_case::ConceptConfig,
    evaluate_use_case::EvaluateConfig,
    export_use_case::ExportConfig,
    import_use_case::{ImportConfig, SourceConfig},
    parse_use_case::ParseConfig,
    train_use_case::TrainConfig,
};
use crate::domain::split::{BalancePolicy, SplitSpec};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a raw corpus and write balanced split files
    Import(ImportArgs),

    /// Build the tokenizer and stage parse trees for each split
    ParseTrees(ParseArgs),

    /// Extract the concept map from a split
    BuildConcepts(ConceptArgs),

    /// Train the self-explaining classifier
    Train(TrainArgs),

    /// Score a parsed file and write predictions with interpretations
    Evaluate(EvaluateArgs),

    /// Score raw texts and explain each sentence
    Characterize(CharacterizeArgs),

    /// Bundle the latest checkpoint into a versioned model folder
    Export(ExportArgs),
}

// ─── import ───────────────────────────────────────────────────────────────────
/// Options shared by every source. Global, so they may follow the
/// source name: `import hsol --input x.csv --balance`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    #[command(subcommand)]
    pub source: SourceCommand,

    /// Directory the split files are written to
    #[arg(long, global = true, default_value = "data")]
    pub output_dir: PathBuf,

    /// Ordered split fractions, applied per class
    #[arg(long, global = true, default_value_t = SplitSpec::default())]
    pub splits: SplitSpec,

    /// Equalise class sizes (truncate to the smallest class)
    #[arg(long, global = true)]
    pub balance: bool,

    /// With --balance, repeat small classes up to the largest instead
    #[arg(long, global = true, requires = "balance")]
    pub pad: bool,

    /// Write `.tsv.gz` instead of `.tsv`
    #[arg(long, global = true)]
    pub compress: bool,

    /// Shuffle each class before splitting
    #[arg(long, global = true)]
    pub shuffle_seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum SourceCommand {
    /// Hate speech CSV with `class` and `tweet` columns
    Hsol {
        #[arg(long)]
        input: PathBuf,
    },

    /// White-supremacist forum annotations plus one text file per post
    Wsf {
        /// annotations_metadata.csv
        #[arg(long)]
        annotations: PathBuf,

        /// Folder next to the annotations holding the post files
        #[arg(long, default_value = "all_files")]
        subfolder: String,

        /// Posts needing more context than this are skipped
        #[arg(long, default_value_t = 0)]
        max_contexts: u32,
    },

    /// Folder with True.csv and Fake.csv news articles
    Isot {
        #[arg(long)]
        folder: PathBuf,
    },

    /// JSON arrays of {score, title, text}, optionally gzip
    ScoredJson {
        #[arg(long = "input", required = true)]
        inputs: Vec<PathBuf>,

        /// Also import the article body, not just the title
        #[arg(long)]
        use_text: bool,

        /// Keep each title/text whole instead of splitting sentences
        #[arg(long)]
        no_split_sentences: bool,
    },

    /// Existing `sentence<TAB>label` file
    Tsv {
        #[arg(long)]
        input: PathBuf,
    },
}

impl From<SourceCommand> for SourceConfig {
    fn from(s: SourceCommand) -> Self {
        match s {
            SourceCommand::Hsol { input } => SourceConfig::Hsol { path: input },
            SourceCommand::Wsf { annotations, subfolder, max_contexts } => {
                SourceConfig::Wsf { annotations, subfolder, max_contexts }
            }
            SourceCommand::Isot { folder } => SourceConfig::Isot { folder },
            SourceCommand::ScoredJson { inputs, use_text, no_split_sentences } => {
                SourceConfig::ScoredJson {
                    paths: inputs,
                    use_text,
                    split_sentences: !no_split_sentences,
                }
            }
            SourceCommand::Tsv { input } => SourceConfig::Tsv { path: input },
        }
    }
}

impl From<ImportArgs> for ImportConfig {
    fn from(a: ImportArgs) -> Self {
        ImportConfig {
            source:       a.source.into(),
            output_dir:   a.output_dir,
            splits:       a.splits,
            balance:      match (a.balance, a.pad) {
                (false, _)    => BalancePolicy::UNBALANCED,
                (true, false) => BalancePolicy::TRUNCATE,
                (true, true)  => BalancePolicy::PAD,
            },
            compress:     a.compress,
            shuffle_seed: a.shuffle_seed,
        }
    }
}

// ─── parse-trees ──────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Directory holding the split TSVs
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Splits to stage, comma separated
    #[arg(long, value_delimiter = ',', default_value = "train,dev,test")]
    pub splits: Vec<String>,

    /// Split whose sentences define the vocabulary
    #[arg(long, default_value = "train")]
    pub vocab_split: String,

    /// Maximum tokenizer vocabulary, special tokens included
    #[arg(long, default_value_t = 30_000)]
    pub tokenizer_vocab: usize,

    /// Re-stage splits whose parse file already exists
    #[arg(long)]
    pub overwrite: bool,
}

impl From<ParseArgs> for ParseConfig {
    fn from(a: ParseArgs) -> Self {
        ParseConfig {
            data_dir:        a.data_dir,
            splits:          a.splits,
            vocab_split:     a.vocab_split,
            tokenizer_vocab: a.tokenizer_vocab,
            overwrite:       a.overwrite,
        }
    }
}

// ─── build-concepts ───────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ConceptArgs {
    /// Split TSV or parse-tree JSON to take concepts from
    #[arg(long, default_value = "data/train.tsv")]
    pub input: PathBuf,

    #[arg(long, default_value = "data/concept_idx.json")]
    pub output: PathBuf,

    /// Longest sentence, in words, kept as a concept
    #[arg(long, default_value_t = 10)]
    pub max_concept_len: usize,

    /// Treat each text as one sentence
    #[arg(long)]
    pub no_split_sentences: bool,
}

impl From<ConceptArgs> for ConceptConfig {
    fn from(a: ConceptArgs) -> Self {
        ConceptConfig {
            input:           a.input,
            output:          a.output,
            max_concept_len: a.max_concept_len,
            split_sentences: !a.no_split_sentences,
        }
    }
}

// ─── train ────────────────────────────────────────────────────────────────────
/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory with tokenizer.json and the `*_with_parse.json` files
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Concept map, defaults to `<data-dir>/concept_idx.json`
    #[arg(long)]
    pub concept_map: Option<PathBuf>,

    /// Directory to save weights, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Maximum tokens per sentence, [CLS] included
    #[arg(long, default_value_t = 128)]
    pub max_seq_len: usize,

    /// Maximum phrases per sentence, root included
    #[arg(long, default_value_t = 64)]
    pub max_phrases: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 5)]
    pub epochs: usize,

    #[arg(long, default_value_t = 2e-4)]
    pub lr: f64,

    /// Hidden dimension of the encoder
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// Attention heads; d_model must be divisible by num_heads
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 4)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    #[arg(long, default_value_t = 2)]
    pub num_classes: usize,

    /// Weight of the concept (GIL) loss
    #[arg(long, default_value_t = 0.01)]
    pub gil_weight: f64,

    /// Weight of the phrase (LIL) loss
    #[arg(long, default_value_t = 0.01)]
    pub lil_weight: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:       a.data_dir,
            concept_map:    a.concept_map,
            checkpoint_dir: a.checkpoint_dir,
            max_seq_len:    a.max_seq_len,
            max_phrases:    a.max_phrases,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            lr:             a.lr,
            d_model:        a.d_model,
            num_heads:      a.num_heads,
            num_layers:     a.num_layers,
            d_ff:           a.d_ff,
            dropout:        a.dropout,
            num_classes:    a.num_classes,
            gil_weight:     a.gil_weight,
            lil_weight:     a.lil_weight,
            seed:           a.seed,
            ..TrainConfig::default()
        }
    }
}

// ─── evaluate ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Parse-tree file to score
    #[arg(long, default_value = "data/dev_with_parse.json")]
    pub input: PathBuf,

    #[arg(long, default_value = "evaluation.tsv")]
    pub output: PathBuf,

    /// Concept map, defaults to the one stored with the checkpoint
    #[arg(long)]
    pub concept_map: Option<PathBuf>,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            checkpoint_dir: a.checkpoint_dir,
            input:          a.input,
            output:         a.output,
            concept_map:    a.concept_map,
            batch_size:     a.batch_size,
        }
    }
}

// ─── characterize ─────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct CharacterizeArgs {
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// `sentence<TAB>label` file; each row is one text
    #[arg(long)]
    pub input: PathBuf,

    /// Only characterize the first N texts
    #[arg(short = 'n', long)]
    pub number: Option<usize>,

    /// Sentences per forward pass, capped at 256
    #[arg(long, default_value_t = 256)]
    pub batch_size: usize,

    /// Concept map, defaults to the one stored with the checkpoint
    #[arg(long)]
    pub concept_map: Option<PathBuf>,

    /// Where staged files go, defaults to `output/<timestamp>`
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Treat each text as one sentence
    #[arg(long)]
    pub no_split_sentences: bool,

    /// Write the evidence of every sentence to this JSON file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl From<&CharacterizeArgs> for CharacterizerConfig {
    fn from(a: &CharacterizeArgs) -> Self {
        CharacterizerConfig {
            checkpoint_dir:  a.checkpoint_dir.clone(),
            concept_map:     a.concept_map.clone(),
            save_dir:        a.save_dir.clone(),
            split_sentences: !a.no_split_sentences,
        }
    }
}

// ─── export ───────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    #[arg(long, default_value = "models/self_explain")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "0.0.1")]
    pub version: String,
}

impl From<ExportArgs> for ExportConfig {
    fn from(a: ExportArgs) -> Self {
        ExportConfig {
            checkpoint_dir: a.checkpoint_dir,
            output_dir:     a.output_dir,
            version:        a.version,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn parse(args: &[&str]) -> Commands {
        let mut argv = vec!["self-explain"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn test_import_options_follow_the_source() {
        let Commands::Import(args) = parse(&[
            "import", "hsol", "--input", "x.csv", "--balance", "--pad", "--splits", "train=0.5,test=0.5",
        ]) else {
            panic!("expected import");
        };
        let cfg = ImportConfig::from(args);
        assert_eq!(cfg.source, SourceConfig::Hsol { path: PathBuf::from("x.csv") });
        assert_eq!(cfg.balance, BalancePolicy::PAD);
        assert_eq!(cfg.splits.names().collect::<Vec<_>>(), vec!["train", "test"]);
        assert_eq!(cfg.output_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_import_defaults() {
        let Commands::Import(args) = parse(&["import", "tsv", "--input", "a.tsv"]) else {
            panic!("expected import");
        };
        let cfg = ImportConfig::from(args);
        assert_eq!(cfg.splits, SplitSpec::default());
        assert_eq!(cfg.balance, BalancePolicy::UNBALANCED);
        assert_eq!(cfg.shuffle_seed, None);
    }

    #[test]
    fn test_balance_without_pad_truncates() {
        let Commands::Import(args) = parse(&["import", "tsv", "--input", "a.tsv", "--balance"]) else {
            panic!("expected import");
        };
        assert_eq!(ImportConfig::from(args).balance, BalancePolicy::TRUNCATE);
    }

    #[test]
    fn test_pad_requires_balance() {
        let argv = ["self-explain", "import", "tsv", "--input", "a.tsv", "--pad"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_bad_splits_are_rejected_by_the_parser() {
        let argv = ["self-explain", "import", "tsv", "--input", "a.tsv", "--splits", "train=1.5"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_scored_json_takes_several_inputs() {
        let Commands::Import(args) = parse(&[
            "import", "scored-json", "--input", "a.json", "--input", "b.json.gz", "--no-split-sentences",
        ]) else {
            panic!("expected import");
        };
        let SourceConfig::ScoredJson { paths, use_text, split_sentences } = ImportConfig::from(args).source
        else {
            panic!("expected scored json");
        };
        assert_eq!(paths.len(), 2);
        assert!(!use_text);
        assert!(!split_sentences);
    }

    #[test]
    fn test_train_args_map_onto_config() {
        let Commands::Train(args) = parse(&["train", "--epochs", "2", "--num-classes", "3"]) else {
            panic!("expected train");
        };
        let cfg = TrainConfig::from(args);
        assert_eq!(cfg.epochs, 2);
        assert_eq!(cfg.num_classes, 3);
        assert_eq!(cfg.vocab_size, 0);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn test_parse_splits_are_comma_separated() {
        let Commands::ParseTrees(args) = parse(&["parse-trees", "--splits", "train,dev"]) else {
            panic!("expected parse-trees");
        };
        assert_eq!(ParseConfig::from(args).splits, vec!["train", "dev"]);
    }

    #[test]
    fn test_characterize_short_number_flag() {
        let Commands::Characterize(args) = parse(&["characterize", "--input", "t.tsv", "-n", "5"]) else {
            panic!("expected characterize");
        };
        assert_eq!(args.number, Some(5));
        assert!(CharacterizerConfig::from(&args).split_sentences);
    }
}
