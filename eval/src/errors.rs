//! Error taxonomy for the evaluator, and conversion of those errors into
//! source-anchored diagnostics.

use std::fmt::Debug;
use std::path::PathBuf;
use std::rc::Rc;

use codemap::Span;
use codemap_diagnostic::{ColorConfig, Diagnostic, Emitter, Level, SpanLabel, SpanStyle};
use thiserror::Error;

use crate::source::SourceCode;

/// The reason a single evaluation step failed. See spec.md §7 for the
/// full taxonomy this implements.
#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error("type error: {0}")]
    TypeError(String),

    #[error("attribute `{}` missing", .path.join("."))]
    AttrMissing { path: Vec<String> },

    #[error("expected a set at `{}`, but found a {actual}", .prefix.join("."))]
    NotASet { prefix: Vec<String>, actual: &'static str },

    #[error("dynamic attribute names are not allowed here")]
    DynamicKeyNotAllowed,

    #[error("missing argument `{0}`")]
    MissingArg(String),

    #[error("unexpected argument `{0}`")]
    UnexpectedArg(String),

    #[error("assertion failed")]
    AssertionFailed,

    #[error("division by zero")]
    DivisionByZero,

    #[error("infinite recursion encountered while forcing a thunk")]
    InfiniteRecursion,

    #[error("error importing `{path}`: {cause}")]
    ImportFailed { path: String, cause: String },

    #[error("cannot coerce a {from} to {to}")]
    CoercionError { from: &'static str, to: &'static str },

    #[error("`with` requires a set, found a {0}")]
    NotAWithScope(&'static str),

    #[error("duplicate attribute `{0}`")]
    DuplicateAttr(String),

    #[error("selector path must have exactly one component here, found {0}")]
    InvalidHasAttrPath(usize),

    #[error("I/O error{}: {error}", .path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    Io {
        path: Option<PathBuf>,
        error: Rc<std::io::Error>,
    },

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("{0}")]
    NixPathResolution(String),
}

/// A failure during evaluation, anchored at the [`Span`] where it was
/// raised, together with the chain of enclosing spans (built from the
/// scope-push chain at the point of failure) for a call-stack-shaped
/// diagnostic.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub span: Span,
    /// Enclosing spans, innermost first, recorded as evaluation
    /// unwinds. Not a guarantee of a complete call stack, just whatever
    /// the caller chose to annotate via [`Error::with_context`].
    pub context: Rc<Vec<Span>>,
}

impl Error {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        Error {
            kind,
            span,
            context: Rc::new(Vec::new()),
        }
    }

    /// Push an enclosing span onto the context chain, cloning the
    /// shared tail only if it is actually being extended.
    pub fn with_context(mut self, span: Span) -> Self {
        Rc::make_mut(&mut self.context).push(span);
        self
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut labels = vec![SpanLabel {
            span: self.span,
            style: SpanStyle::Primary,
            label: Some(self.kind.to_string()),
        }];

        labels.extend(self.context.iter().map(|span| SpanLabel {
            span: *span,
            style: SpanStyle::Secondary,
            label: Some("while evaluating this".to_string()),
        }));

        Diagnostic {
            level: Level::Error,
            message: self.kind.to_string(),
            code: None,
            spans: labels,
        }
    }

    /// Render this error to a string using the given source map,
    /// without requiring a terminal.
    pub fn render(&self, source: &SourceCode) -> String {
        let mut out = Vec::new();
        {
            let codemap = source.codemap();
            let mut emitter = Emitter::vec(&mut out, Some(&codemap));
            emitter.emit(&[self.to_diagnostic()]);
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {}

pub type EvalResult<T> = Result<T, Error>;

/// Helper for tests and REPLs: emit every diagnostic in `errors` to
/// stderr with ANSI colors, given the file they originated from.
pub fn print_errors(errors: &[Error], source: &SourceCode) {
    let codemap = source.codemap();
    let mut emitter = Emitter::stderr(ColorConfig::Auto, Some(&codemap));
    let diagnostics: Vec<Diagnostic> = errors.iter().map(Error::to_diagnostic).collect();
    emitter.emit(&diagnostics);
}
