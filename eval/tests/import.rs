//! Exercises `import_file` (spec.md §4.1) against a real file on disk,
//! the one externally observable blocking point the core has (spec.md
//! §5). Since lexing/parsing is out of scope (spec.md §1), the
//! [`Parser`] plugged in here only understands a single integer
//! literal — just enough to prove the file is actually read, parsed,
//! and evaluated through `StdIO`.

use std::path::Path;
use std::rc::Rc;

use nix_lang_eval::ast::Expr;
use nix_lang_eval::value::{Atom, NormalValue};
use nix_lang_eval::{Error, ErrorKind, EvalResult, Evaluation, NixSearchPath, Parser, SourceCode, StdIO};

struct IntOnlyParser;

impl Parser for IntOnlyParser {
    fn parse(&self, code: &str, path: &Path) -> EvalResult<Rc<Expr>> {
        let mut codemap = codemap::CodeMap::new();
        let file = codemap.add_file(path.display().to_string(), code.to_string());
        let n: i64 = code.trim().parse().map_err(|_| {
            Error::new(
                ErrorKind::ImportFailed {
                    path: path.display().to_string(),
                    cause: "not an integer literal".into(),
                },
                file.span,
            )
        })?;
        Ok(Rc::new(Expr::Constant(Atom::Int(n), file.span)))
    }
}

fn session() -> Evaluation {
    Evaluation::new(Box::new(StdIO), NixSearchPath::default(), SourceCode::new())
        .with_parser(Box::new(IntOnlyParser))
}

#[test]
fn import_reads_parses_and_evaluates_a_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("forty-two.nix");
    std::fs::write(&file_path, "42\n").unwrap();

    let evaluation = session();
    let span = evaluation
        .source()
        .add_file(file_path.display().to_string(), String::new())
        .span;

    let evaluator = evaluation.evaluator();
    let thunk = evaluator
        .import_file(&file_path, span)
        .expect("import_file should read and parse the file");

    let forced = thunk.force(evaluator).expect("forcing the imported thunk should succeed");
    let value =
        nix_lang_eval::normalize::normalize(evaluator, forced).expect("normalizing should succeed");

    match value {
        NormalValue::Constant(Atom::Int(i)) => assert_eq!(i, 42),
        other => panic!("expected an int, got {other:?}"),
    }
}

#[test]
fn import_of_a_missing_file_is_an_import_failure() {
    let evaluation = session();
    let missing = std::path::PathBuf::from("/nonexistent/nowhere.nix");
    let span = evaluation
        .source()
        .add_file("missing".to_string(), String::new())
        .span;

    let err = evaluation
        .evaluator()
        .import_file(&missing, span)
        .expect_err("importing a nonexistent file should fail");

    assert!(matches!(err.kind, ErrorKind::Io { .. }));
}
