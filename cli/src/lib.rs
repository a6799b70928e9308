//! Glue between the small Nix-subset [`reader`] and `nix_lang_eval`'s
//! public evaluation API, shared by `main` and the REPL.

use std::fmt::Write as _;
use std::path::Path;
use std::rc::Rc;

use codemap_diagnostic::{Diagnostic, Emitter, Level as DiagLevel, SpanLabel, SpanStyle};
use nix_lang_eval::ast::Expr;
use nix_lang_eval::{
    Error, ErrorKind, EvalResult, Evaluation, NixSearchPath, Parser, SourceCode, StdIO,
};

pub mod args;
pub mod reader;
pub mod repl;

pub use args::Args;
pub use repl::Repl;

/// Adapts [`reader::parse`] to the [`nix_lang_eval::Parser`] trait that
/// `import` needs, registering every parsed file (including imports)
/// with a single shared [`SourceCode`] so diagnostics across files
/// share one codemap.
pub struct ReaderParser {
    source: SourceCode,
}

impl ReaderParser {
    pub fn new(source: SourceCode) -> Self {
        ReaderParser { source }
    }
}

impl Parser for ReaderParser {
    fn parse(&self, code: &str, path: &Path) -> EvalResult<Rc<Expr>> {
        let file = self.source.add_file(path.display().to_string(), code.to_string());
        reader::parse(&file).map_err(|e| {
            Error::new(
                ErrorKind::ImportFailed {
                    path: path.display().to_string(),
                    cause: e.message,
                },
                e.span,
            )
        })
    }
}

/// Builds an [`Evaluation`] session wired up with real filesystem I/O,
/// the `-I`/`NIX_PATH` search path from `args`, and a [`ReaderParser`]
/// sharing `source`'s codemap.
pub fn build_evaluation(args: &Args, source: SourceCode) -> Evaluation {
    let nix_search_path = args
        .nix_search_path
        .as_deref()
        .unwrap_or("")
        .parse::<NixSearchPath>()
        .unwrap_or_default();

    Evaluation::new(Box::new(StdIO), nix_search_path, source.clone())
        .with_parser(Box::new(ReaderParser::new(source)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompleteInput;

/// The rendered outcome of one [`interpret`] call: everything that
/// would be printed, plus whether evaluation produced a value. Kept as
/// a buffer (rather than printed directly) so the REPL tests can
/// assert on it without capturing stdout.
pub struct InterpretResult {
    output: String,
    success: bool,
    incomplete: bool,
}

impl InterpretResult {
    fn incomplete() -> Self {
        InterpretResult {
            output: String::new(),
            success: false,
            incomplete: true,
        }
    }

    pub fn finalize(self) -> bool {
        print!("{}", self.output);
        self.success
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }
}

/// Parses `code` (already registered in `source`'s codemap as `file`)
/// and evaluates it with `evaluation`, rendering the result and any
/// diagnostics into an [`InterpretResult`].
///
/// If the reader ran out of tokens before closing every bracket/paren
/// and `allow_incomplete` is set, returns `Err(IncompleteInput)`
/// instead so a REPL can keep accumulating lines.
pub fn interpret(
    evaluation: &Evaluation,
    source: &SourceCode,
    file: &std::sync::Arc<codemap::File>,
    args: &Args,
    allow_incomplete: bool,
) -> Result<InterpretResult, IncompleteInput> {
    let mut output = String::new();

    let expr = match reader::parse(file) {
        Ok(expr) => expr,
        Err(e) if e.incomplete && allow_incomplete => return Err(IncompleteInput),
        Err(e) => {
            write!(&mut output, "{}", render_parse_error(&e, source)).unwrap();
            return Ok(InterpretResult { output, success: false, incomplete: false });
        }
    };

    if args.display_ast {
        eprintln!("AST: {expr:#?}");
    }

    let result = evaluation.evaluate(&expr);

    if let Some(value) = result.value.as_ref() {
        if args.raw {
            if let nix_lang_eval::NormalValue::Str(s) = value {
                writeln!(&mut output, "{}", s.as_str()).unwrap();
            } else {
                writeln!(&mut output, "{value}").unwrap();
            }
        } else {
            writeln!(&mut output, "=> {} :: {}", value, value.type_name()).unwrap();
        }
    }

    for error in &result.errors {
        write!(&mut output, "{}", error.render(source)).unwrap();
    }

    Ok(InterpretResult {
        output,
        success: result.value.is_some(),
        incomplete: false,
    })
}

/// Renders a [`reader::ParseError`] the same way [`Error::render`]
/// renders evaluator errors, without forcing it through an
/// [`ErrorKind`] variant it doesn't semantically belong to.
fn render_parse_error(err: &reader::ParseError, source: &SourceCode) -> String {
    let diagnostic = Diagnostic {
        level: DiagLevel::Error,
        message: err.message.clone(),
        code: None,
        spans: vec![SpanLabel {
            span: err.span,
            style: SpanStyle::Primary,
            label: None,
        }],
    };

    let mut out = Vec::new();
    {
        let codemap = source.codemap();
        let mut emitter = Emitter::vec(&mut out, Some(&codemap));
        emitter.emit(&[diagnostic]);
    }
    String::from_utf8_lossy(&out).into_owned()
}
