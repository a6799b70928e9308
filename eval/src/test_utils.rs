//! Test-only helpers shared across the crate's unit and integration
//! tests.

use codemap::CodeMap;

/// Create a dummy [`codemap::Span`] for use in tests that don't care
/// about accurate source locations.
pub(crate) fn dummy_span() -> codemap::Span {
    let mut codemap = CodeMap::new();
    let file = codemap.add_file("<test>".to_owned(), "<test>".to_owned());
    file.span
}
