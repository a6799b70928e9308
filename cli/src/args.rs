use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

/// Command-line front-end for `nix-lang-eval`.
///
/// Reads a deliberately small subset of Nix expression syntax (see
/// [`crate::reader`]) and runs it through the evaluation core. There is
/// no store, build, or derivation-realization integration here: the
/// evaluator itself doesn't have one to drive, so the CLI around it
/// doesn't grow one either.
///
/// The CLI interface is not stable and subject to change.
#[derive(Parser, Clone)]
pub struct Args {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Path to a script to evaluate
    pub script: Option<PathBuf>,

    #[clap(long, short = 'E')]
    pub expr: Option<String>,

    /// Dump the parsed AST to stderr before evaluating
    #[clap(long, env = "NIX_LANG_DISPLAY_AST")]
    pub display_ast: bool,

    /// A colon-separated list of directories to use to resolve `<...>`-style paths
    #[clap(long, short = 'I', env = "NIX_PATH")]
    pub nix_search_path: Option<String>,

    /// Print "raw" (unquoted) output for string results.
    #[clap(long)]
    pub raw: bool,
}
