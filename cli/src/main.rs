use std::fs;
use std::path::PathBuf;

use clap::Parser;
use nix_lang_cli::{build_evaluation, interpret, Args, Repl};
use nix_lang_eval::SourceCode;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_string())),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(file) = &args.script {
        run_file(file.clone(), &args)
    } else if let Some(expr) = &args.expr {
        if !run_one(expr.clone(), "<expr>", &args) {
            std::process::exit(1);
        }
    } else {
        Repl::new(&args).run()
    }
}

fn run_file(mut path: PathBuf, args: &Args) {
    if path.is_dir() {
        path.push("default.nix");
    }
    let name = path.display().to_string();
    let contents = fs::read_to_string(&path).expect("failed to read the input file");

    if !run_one(contents, &name, args) {
        std::process::exit(1);
    }
}

fn run_one(code: String, name: &str, args: &Args) -> bool {
    let source = SourceCode::new();
    let evaluation = build_evaluation(args, source.clone());
    let file = source.add_file(name.to_string(), code);

    match interpret(&evaluation, &source, &file, args, false) {
        Ok(result) => result.finalize(),
        Err(_) => unreachable!("run_one never allows incomplete input"),
    }
}
