//! A minimal read-eval-print loop over [`crate::interpret`].

use std::path::PathBuf;

use nix_lang_eval::{Evaluation, SourceCode};
use rustyline::error::ReadlineError;
use rustyline::Editor;

use crate::{build_evaluation, interpret, Args, IncompleteInput, InterpretResult};

fn state_dir() -> Option<PathBuf> {
    let mut path = dirs::data_dir();
    if let Some(p) = path.as_mut() {
        p.push("nix-lang");
    }
    path
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Expr(&'a str),
    Quit,
    Help,
}

impl<'a> ReplCommand<'a> {
    const HELP: &'static str = "
Welcome to the nix-lang REPL!

The following commands are supported:

  <expr>    Evaluate an expression and print the result, along with its inferred type
  :q        Exit the REPL
  :?, :h    Display this help text
";

    pub fn parse(input: &'a str) -> Self {
        if input.starts_with(':') {
            let trimmed = input.trim_end();
            match trimmed {
                ":q" => return Self::Quit,
                ":h" | ":?" => return Self::Help,
                _ => {}
            }
        }

        Self::Expr(input)
    }
}

/// A REPL session: one [`Evaluation`] (so `let`-bound imports and the
/// codemap persist across lines) plus rustyline editor state.
pub struct Repl {
    evaluation: Evaluation,
    source: SourceCode,
    args: Args,
    multiline_input: Option<String>,
    line_no: usize,
    rl: Editor<()>,
}

impl Repl {
    pub fn new(args: &Args) -> Self {
        let source = SourceCode::new();
        let evaluation = build_evaluation(args, source.clone());
        let rl = Editor::<()>::new().expect("should be able to launch rustyline");
        Repl {
            evaluation,
            source,
            args: args.clone(),
            multiline_input: None,
            line_no: 0,
            rl,
        }
    }

    /// Feeds one line of input to the session, accumulating it with
    /// any previously incomplete input, and evaluates it once the
    /// reader considers the accumulated text a complete expression.
    pub fn send(&mut self, line: String) -> InterpretResult {
        self.line_no += 1;
        let input = match &mut self.multiline_input {
            Some(mi) => {
                mi.push('\n');
                mi.push_str(&line);
                mi.clone()
            }
            None => line,
        };

        let name = format!("repl:{}", self.line_no);
        let file = self.source.add_file(name, input.clone());

        match interpret(&self.evaluation, &self.source, &file, &self.args, true) {
            Ok(result) => {
                self.multiline_input = None;
                result
            }
            Err(IncompleteInput) => {
                self.multiline_input = Some(input);
                InterpretResult::incomplete()
            }
        }
    }

    pub fn run(&mut self) {
        let history_path = match state_dir() {
            Some(mut path) => {
                let _ = std::fs::create_dir_all(&path);
                path.push("history.txt");
                let _ = self.rl.load_history(&path);
                Some(path)
            }
            None => None,
        };

        loop {
            let prompt = if self.multiline_input.is_some() {
                "         > "
            } else {
                "nix-lang> "
            };

            match self.rl.readline(prompt) {
                Ok(line) => {
                    if line.is_empty() && self.multiline_input.is_none() {
                        continue;
                    }

                    match ReplCommand::parse(&line) {
                        ReplCommand::Quit => break,
                        ReplCommand::Help => println!("{}", ReplCommand::HELP),
                        ReplCommand::Expr(_) => {
                            let _ = self.rl.add_history_entry(line.as_str());
                            let result = self.send(line);
                            if !result.is_incomplete() {
                                result.finalize();
                            }
                        }
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("error: {err}");
                    break;
                }
            }
        }

        if let Some(path) = history_path {
            let _ = self.rl.save_history(&path);
        }
    }
}
