//! A trivial reader for a useful subset of Nix expression syntax.
//!
//! `nix-lang-eval` deliberately has no Nix-syntax lexer/parser (spec.md
//! §1, Non-goals: the evaluator's input is an already-built
//! [`nix_lang_eval::ast::Expr`]). For the CLI and REPL to be usable
//! from plain text rather than only from hand-built trees, this module
//! provides a small, honestly-limited recursive-descent reader. It is
//! not a replacement for a real Nix front end (that would lower a CST
//! from a crate like `rnix`, tracking every byte of whitespace and
//! comment) — just enough grammar to drive the evaluator end to end:
//! literals, lists, attribute sets (plain and `rec`), `let`/`if`/`with`/
//! `assert`, lambdas (including parameter sets with defaults, `...`,
//! and `@`-bindings), application, selection (`.`/`or`/`?`), and the
//! unary/binary operators, with a reasonable (if not Nix-exact)
//! precedence table.

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use codemap::{File, Span};

use nix_lang_eval::ast::{
    AstFormal, AttrName, AttrPath, Binding, BinaryOp, Expr, Params, StrPart, UnaryOp,
};
use nix_lang_eval::value::{Atom, NixString};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// Set when the error is simply "ran out of tokens" — the REPL
    /// uses this to decide whether to keep reading more lines rather
    /// than reporting a hard failure.
    pub incomplete: bool,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses `src` (already added to `file`'s codemap) into an [`Expr`].
pub fn parse(file: &Arc<File>) -> ParseResult<Rc<Expr>> {
    let tokens = lex(file)?;
    let mut parser = TokenParser { tokens, pos: 0, file: file.clone() };
    let expr = parser.expr()?;
    parser.expect_end()?;
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Ident(String),
    Str(Vec<StrTok>),
    Path(PathBuf),
    EnvPath(String),
    // keywords
    Let,
    In,
    Rec,
    If,
    Then,
    Else,
    With,
    Assert,
    Inherit,
    Or,
    True,
    False,
    Null,
    Ellipsis,
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Colon,
    Comma,
    Dot,
    Eq,
    Question,
    At,
    // operators
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NEq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Impl,
    SlashSlash,
    PlusPlus,
    Bang,
}

/// A segment of a double-quoted string: either literal text or a
/// nested, already-tokenized `${ ... }` interpolation.
#[derive(Debug, Clone, PartialEq)]
enum StrTok {
    Literal(String),
    Interp(Vec<(Tok, Span)>),
}

fn lex(file: &Arc<File>) -> ParseResult<Vec<(Tok, Span)>> {
    let src = file.source();
    let bytes = src.as_bytes();
    let mut i = 0usize;
    let mut out = Vec::new();

    while i < bytes.len() {
        let c = bytes[i] as char;

        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
            continue;
        }

        let start = i;

        // String literal.
        if c == '"' {
            let (parts, end) = lex_string(file, src, i + 1)?;
            out.push((Tok::Str(parts), file.span.subspan(start as u64, end as u64)));
            i = end;
            continue;
        }

        // `<search-path>` style env path: only treated as such when it
        // looks like one; otherwise `<` is the less-than operator.
        if c == '<' {
            if let Some(end) = try_lex_env_path(src, i) {
                let inner = &src[i + 1..end - 1];
                out.push((
                    Tok::EnvPath(inner.to_string()),
                    file.span.subspan(start as u64, end as u64),
                ));
                i = end;
                continue;
            }
        }

        // Path literal: `./foo`, `../foo`. Bare absolute paths (`/foo`)
        // are not distinguished from division/update here and are left
        // out of this trivial grammar.
        if c == '.' && bytes.get(i + 1) == Some(&b'/') {
            let end = lex_path(src, i);
            out.push((Tok::Path(PathBuf::from(&src[start..end])), file.span.subspan(start as u64, end as u64)));
            i = end;
            continue;
        }

        if c.is_ascii_digit() {
            let mut end = i;
            while end < bytes.len() && (bytes[end] as char).is_ascii_digit() {
                end += 1;
            }
            let text = &src[start..end];
            let n: i64 = text
                .parse()
                .map_err(|_| lex_error(file, start, end, format!("invalid integer literal `{text}`")))?;
            out.push((Tok::Int(n), file.span.subspan(start as u64, end as u64)));
            i = end;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut end = i;
            while end < bytes.len() {
                let ch = bytes[end] as char;
                if ch.is_alphanumeric() || ch == '_' || ch == '\'' || ch == '-' {
                    end += 1;
                } else {
                    break;
                }
            }
            let word = &src[start..end];
            let tok = match word {
                "let" => Tok::Let,
                "in" => Tok::In,
                "rec" => Tok::Rec,
                "if" => Tok::If,
                "then" => Tok::Then,
                "else" => Tok::Else,
                "with" => Tok::With,
                "assert" => Tok::Assert,
                "inherit" => Tok::Inherit,
                "or" => Tok::Or,
                "true" => Tok::True,
                "false" => Tok::False,
                "null" => Tok::Null,
                _ => Tok::Ident(word.to_string()),
            };
            out.push((tok, file.span.subspan(start as u64, end as u64)));
            i = end;
            continue;
        }

        macro_rules! op {
            ($len:expr, $tok:expr) => {{
                out.push(($tok, file.span.subspan(start as u64, (start + $len) as u64)));
                i += $len;
                continue;
            }};
        }

        match c {
            '.' if src[i..].starts_with("...") => op!(3, Tok::Ellipsis),
            '(' => op!(1, Tok::LParen),
            ')' => op!(1, Tok::RParen),
            '{' => op!(1, Tok::LBrace),
            '}' => op!(1, Tok::RBrace),
            '[' => op!(1, Tok::LBracket),
            ']' => op!(1, Tok::RBracket),
            ';' => op!(1, Tok::Semi),
            ':' => op!(1, Tok::Colon),
            ',' => op!(1, Tok::Comma),
            '.' => op!(1, Tok::Dot),
            '?' => op!(1, Tok::Question),
            '@' => op!(1, Tok::At),
            '=' if src[i..].starts_with("==") => op!(2, Tok::EqEq),
            '=' => op!(1, Tok::Eq),
            '!' if src[i..].starts_with("!=") => op!(2, Tok::NEq),
            '!' => op!(1, Tok::Bang),
            '<' if src[i..].starts_with("<=") => op!(2, Tok::Lte),
            '<' => op!(1, Tok::Lt),
            '>' if src[i..].starts_with(">=") => op!(2, Tok::Gte),
            '>' => op!(1, Tok::Gt),
            '&' if src[i..].starts_with("&&") => op!(2, Tok::AndAnd),
            '|' if src[i..].starts_with("||") => op!(2, Tok::OrOr),
            '-' if src[i..].starts_with("->") => op!(2, Tok::Impl),
            '-' => op!(1, Tok::Minus),
            '+' if src[i..].starts_with("++") => op!(2, Tok::PlusPlus),
            '+' => op!(1, Tok::Plus),
            '/' if src[i..].starts_with("//") => op!(2, Tok::SlashSlash),
            '/' => op!(1, Tok::Slash),
            '*' => op!(1, Tok::Star),
            _ => {
                return Err(lex_error(file, start, start + 1, format!("unexpected character `{c}`")));
            }
        }
    }

    Ok(out)
}

fn lex_error(file: &Arc<File>, start: usize, end: usize, message: String) -> ParseError {
    ParseError { message, span: file.span.subspan(start as u64, end as u64), incomplete: false }
}

fn lex_path(src: &str, start: usize) -> usize {
    let bytes = src.as_bytes();
    let mut end = start;
    while end < bytes.len() {
        let ch = bytes[end] as char;
        if ch.is_alphanumeric() || matches!(ch, '.' | '/' | '_' | '-') {
            end += 1;
        } else {
            break;
        }
    }
    end
}

fn try_lex_env_path(src: &str, start: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut end = start + 1;
    let body_start = end;
    while end < bytes.len() {
        let ch = bytes[end] as char;
        if ch.is_alphanumeric() || matches!(ch, '.' | '/' | '_' | '-') {
            end += 1;
        } else {
            break;
        }
    }
    if end > body_start && bytes.get(end) == Some(&b'>') {
        Some(end + 1)
    } else {
        None
    }
}

/// Lexes the body of a double-quoted string starting just after the
/// opening `"`, returning its parts and the index just past the
/// closing `"`. `${ ... }` interpolations are tokenized recursively by
/// re-invoking [`lex`]'s character loop on the inner text.
fn lex_string(file: &Arc<File>, src: &str, mut i: usize) -> ParseResult<(Vec<StrTok>, usize)> {
    let bytes = src.as_bytes();
    let mut parts = Vec::new();
    let mut literal = String::new();

    loop {
        if i >= bytes.len() {
            return Err(ParseError {
                message: "unterminated string literal".into(),
                span: file.span,
                incomplete: true,
            });
        }
        let c = bytes[i] as char;
        match c {
            '"' => {
                if !literal.is_empty() {
                    parts.push(StrTok::Literal(std::mem::take(&mut literal)));
                }
                return Ok((parts, i + 1));
            }
            '\\' => {
                let escaped = bytes.get(i + 1).copied().unwrap_or(b'"') as char;
                literal.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            '$' if bytes.get(i + 1) == Some(&b'{') => {
                if !literal.is_empty() {
                    parts.push(StrTok::Literal(std::mem::take(&mut literal)));
                }
                let mut depth = 1;
                let inner_start = i + 2;
                let mut j = inner_start;
                while j < bytes.len() && depth > 0 {
                    match bytes[j] as char {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    if depth > 0 {
                        j += 1;
                    }
                }
                if depth != 0 {
                    return Err(ParseError {
                        message: "unterminated `${...}` interpolation".into(),
                        span: file.span,
                        incomplete: true,
                    });
                }
                let inner_src = &src[inner_start..j];
                let inner_tokens = lex_plain(inner_src)?;
                parts.push(StrTok::Interp(inner_tokens));
                i = j + 1;
            }
            _ => {
                literal.push(c);
                i += 1;
            }
        }
    }
}

/// Lexes a standalone snippet (used for `${...}` interpolation bodies)
/// without span tracking against the outer file — interpolations get
/// the enclosing string literal's span for diagnostics.
fn lex_plain(src: &str) -> ParseResult<Vec<(Tok, Span)>> {
    let mut codemap = codemap::CodeMap::new();
    let file = codemap.add_file("<interpolation>".into(), src.to_string());
    lex(&file)
}

struct TokenParser {
    tokens: Vec<(Tok, Span)>,
    pos: usize,
    file: Arc<File>,
}

impl TokenParser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or(self.file.span)
    }

    fn bump(&mut self) -> Option<(Tok, Span)> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> ParseResult<Span> {
        match self.bump() {
            Some((t, s)) if &t == tok => Ok(s),
            Some((t, s)) => Err(ParseError {
                message: format!("expected {tok:?}, found {t:?}"),
                span: s,
                incomplete: false,
            }),
            None => Err(ParseError {
                message: format!("expected {tok:?}, found end of input"),
                span: self.peek_span(),
                incomplete: true,
            }),
        }
    }

    fn expect_end(&mut self) -> ParseResult<()> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            let (t, s) = self.tokens[self.pos].clone();
            Err(ParseError { message: format!("unexpected trailing token {t:?}"), span: s, incomplete: false })
        }
    }

    fn expect_ident(&mut self) -> ParseResult<(String, Span)> {
        match self.bump() {
            Some((Tok::Ident(name), s)) => Ok((name, s)),
            Some((t, s)) => Err(ParseError { message: format!("expected an identifier, found {t:?}"), span: s, incomplete: false }),
            None => Err(ParseError { message: "expected an identifier, found end of input".into(), span: self.peek_span(), incomplete: true }),
        }
    }

    // expr := assertExpr | withExpr | letExpr | ifExpr | lambdaExpr | opExpr
    fn expr(&mut self) -> ParseResult<Rc<Expr>> {
        match self.peek() {
            Some(Tok::Assert) => {
                let start = self.bump().unwrap().1;
                let cond = self.expr()?;
                self.eat(&Tok::Semi)?;
                let body = self.expr()?;
                Ok(Rc::new(Expr::Assert(cond, body, start)))
            }
            Some(Tok::With) => {
                let start = self.bump().unwrap().1;
                let set = self.expr()?;
                self.eat(&Tok::Semi)?;
                let body = self.expr()?;
                Ok(Rc::new(Expr::With(set, body, start)))
            }
            Some(Tok::Let) => {
                let start = self.bump().unwrap().1;
                let bindings = self.bindings(&Tok::In)?;
                self.eat(&Tok::In)?;
                let body = self.expr()?;
                Ok(Rc::new(Expr::Let(bindings, body, start)))
            }
            Some(Tok::If) => {
                let start = self.bump().unwrap().1;
                let cond = self.expr()?;
                self.eat(&Tok::Then)?;
                let then_branch = self.expr()?;
                self.eat(&Tok::Else)?;
                let else_branch = self.expr()?;
                Ok(Rc::new(Expr::If(cond, then_branch, else_branch, start)))
            }
            // `ident: body` — a single-argument lambda. Distinguished
            // from a bare `Sym` by lookahead past the identifier.
            Some(Tok::Ident(_)) if matches!(self.tokens.get(self.pos + 1).map(|(t, _)| t), Some(Tok::Colon)) => {
                let (name, start) = self.expect_ident()?;
                self.eat(&Tok::Colon)?;
                let body = self.expr()?;
                Ok(Rc::new(Expr::Abs(
                    Rc::new(Params::Named(NixString::from(name.as_str()))),
                    body,
                    start,
                )))
            }
            // `ident @ { ... }: body`
            Some(Tok::Ident(_)) if matches!(self.tokens.get(self.pos + 1).map(|(t, _)| t), Some(Tok::At)) => {
                let (name, start) = self.expect_ident()?;
                self.eat(&Tok::At)?;
                self.eat(&Tok::LBrace)?;
                let params = self.param_set(Some(NixString::from(name.as_str())))?;
                self.eat(&Tok::Colon)?;
                let body = self.expr()?;
                Ok(Rc::new(Expr::Abs(Rc::new(params), body, start)))
            }
            // `{ ... }: body` or `{ ... } @ ident: body`
            Some(Tok::LBrace) if self.looks_like_param_set() => {
                let start = self.peek_span();
                self.eat(&Tok::LBrace)?;
                let mut params = self.param_set(None)?;
                if matches!(self.peek(), Some(Tok::At)) {
                    self.bump();
                    let (name, _) = self.expect_ident()?;
                    params = match params {
                        Params::FixedParamSet { fields, .. } => {
                            Params::FixedParamSet { fields, self_name: Some(NixString::from(name.as_str())) }
                        }
                        Params::VariadicParamSet { fields, .. } => {
                            Params::VariadicParamSet { fields, self_name: Some(NixString::from(name.as_str())) }
                        }
                        other => other,
                    };
                }
                self.eat(&Tok::Colon)?;
                let body = self.expr()?;
                Ok(Rc::new(Expr::Abs(Rc::new(params), body, start)))
            }
            _ => self.op_expr(0),
        }
    }

    /// Parameter-set lambdas and plain-set literals both start with
    /// `{`; this peeks far enough ahead (to the matching `}` and past
    /// it) to tell whether a `:` or `@` follows, which only a lambda
    /// has.
    fn looks_like_param_set(&self) -> bool {
        let mut depth = 0i32;
        let mut j = self.pos;
        loop {
            match self.tokens.get(j).map(|(t, _)| t) {
                Some(Tok::LBrace) => {
                    depth += 1;
                    j += 1;
                }
                Some(Tok::RBrace) => {
                    depth -= 1;
                    j += 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some(_) => j += 1,
                None => return false,
            }
        }
        matches!(self.tokens.get(j).map(|(t, _)| t), Some(Tok::Colon) | Some(Tok::At))
    }

    fn param_set(&mut self, self_name: Option<NixString>) -> ParseResult<Params> {
        let mut fields = Vec::new();
        let mut variadic = false;
        if !matches!(self.peek(), Some(Tok::RBrace)) {
            loop {
                if matches!(self.peek(), Some(Tok::Ellipsis)) {
                    self.bump();
                    variadic = true;
                    break;
                }
                let (name, _) = self.expect_ident()?;
                let default = if matches!(self.peek(), Some(Tok::Question)) {
                    self.bump();
                    Some(self.op_expr(0)?)
                } else {
                    None
                };
                fields.push(AstFormal { name: NixString::from(name.as_str()), default });
                if matches!(self.peek(), Some(Tok::Comma)) {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.eat(&Tok::RBrace)?;
        Ok(if variadic {
            Params::VariadicParamSet { fields, self_name }
        } else {
            Params::FixedParamSet { fields, self_name }
        })
    }

    /// Bindings for `let`/`{`/`rec {`, terminated by `terminator`
    /// (either `in` or `}`, the latter consumed by the caller).
    fn bindings(&mut self, terminator: &Tok) -> ParseResult<Vec<Binding>> {
        let mut out = Vec::new();
        while self.peek() != Some(terminator) {
            if matches!(self.peek(), Some(Tok::Inherit)) {
                let start = self.bump().unwrap().1;
                let source = if matches!(self.peek(), Some(Tok::LParen)) {
                    self.bump();
                    let e = self.expr()?;
                    self.eat(&Tok::RParen)?;
                    Some(e)
                } else {
                    None
                };
                let mut names = Vec::new();
                while let Some(Tok::Ident(_)) = self.peek() {
                    let (name, _) = self.expect_ident()?;
                    names.push(NixString::from(name.as_str()));
                }
                self.eat(&Tok::Semi)?;
                out.push(Binding::Inherit(source, names, start));
                continue;
            }

            let start = self.peek_span();
            let path = self.attr_path()?;
            self.eat(&Tok::Eq)?;
            let value = self.expr()?;
            self.eat(&Tok::Semi)?;
            out.push(Binding::NamedVar(path, value, start));
        }
        Ok(out)
    }

    fn attr_path(&mut self) -> ParseResult<AttrPath> {
        let mut names = vec![self.attr_name()?];
        while matches!(self.peek(), Some(Tok::Dot)) {
            self.bump();
            names.push(self.attr_name()?);
        }
        Ok(AttrPath::new(names))
    }

    fn attr_name(&mut self) -> ParseResult<AttrName> {
        if matches!(self.peek(), Some(Tok::Str(_))) {
            let e = self.atom()?;
            Ok(AttrName::Dynamic(e))
        } else {
            let (name, _) = self.expect_ident()?;
            Ok(AttrName::Static(NixString::from(name.as_str())))
        }
    }

    fn binop_prec(op: &Tok) -> Option<(u8, bool, BinaryOp)> {
        Some(match op {
            Tok::Impl => (1, true, BinaryOp::Impl),
            Tok::OrOr => (2, false, BinaryOp::Or),
            Tok::AndAnd => (3, false, BinaryOp::And),
            Tok::EqEq => (4, false, BinaryOp::Eq),
            Tok::NEq => (4, false, BinaryOp::NEq),
            Tok::Lt => (5, false, BinaryOp::Lt),
            Tok::Lte => (5, false, BinaryOp::Lte),
            Tok::Gt => (5, false, BinaryOp::Gt),
            Tok::Gte => (5, false, BinaryOp::Gte),
            Tok::SlashSlash => (6, true, BinaryOp::Update),
            Tok::PlusPlus => (7, true, BinaryOp::Concat),
            Tok::Plus => (8, false, BinaryOp::Plus),
            Tok::Minus => (8, false, BinaryOp::Minus),
            Tok::Star => (9, false, BinaryOp::Mult),
            Tok::Slash => (9, false, BinaryOp::Div),
            _ => return None,
        })
    }

    /// Precedence-climbing parse of the binary-operator grammar, with
    /// unary/application/selection as the tightest-binding layer.
    fn op_expr(&mut self, min_prec: u8) -> ParseResult<Rc<Expr>> {
        let mut lhs = self.unary_expr()?;
        loop {
            let Some(op_tok) = self.peek() else { break };
            let Some((prec, right_assoc, op)) = Self::binop_prec(op_tok) else { break };
            if prec < min_prec {
                break;
            }
            let span = self.bump().unwrap().1;
            let next_min = if right_assoc { prec } else { prec + 1 };
            let rhs = self.op_expr(next_min)?;
            lhs = Rc::new(Expr::Binary(op, lhs, rhs, span));
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> ParseResult<Rc<Expr>> {
        match self.peek() {
            Some(Tok::Minus) => {
                let span = self.bump().unwrap().1;
                let inner = self.unary_expr()?;
                Ok(Rc::new(Expr::Unary(UnaryOp::Neg, inner, span)))
            }
            Some(Tok::Bang) => {
                let span = self.bump().unwrap().1;
                let inner = self.unary_expr()?;
                Ok(Rc::new(Expr::Unary(UnaryOp::Not, inner, span)))
            }
            _ => self.app_expr(),
        }
    }

    /// Application is left-associative juxtaposition: `f x y` is
    /// `(f x) y`. Anything that can start an `atom` can also start the
    /// next argument, so we greedily keep consuming select-expressions.
    fn app_expr(&mut self) -> ParseResult<Rc<Expr>> {
        let mut head = self.select_expr()?;
        while self.starts_atom() {
            let span = self.peek_span();
            let arg = self.select_expr()?;
            head = Rc::new(Expr::App(head, arg, span));
        }
        Ok(head)
    }

    fn starts_atom(&self) -> bool {
        matches!(
            self.peek(),
            Some(Tok::Int(_))
                | Some(Tok::Ident(_))
                | Some(Tok::Str(_))
                | Some(Tok::Path(_))
                | Some(Tok::EnvPath(_))
                | Some(Tok::LParen)
                | Some(Tok::LBracket)
                | Some(Tok::LBrace)
                | Some(Tok::Rec)
                | Some(Tok::True)
                | Some(Tok::False)
                | Some(Tok::Null)
        )
    }

    fn select_expr(&mut self) -> ParseResult<Rc<Expr>> {
        let mut head = self.atom()?;
        loop {
            if matches!(self.peek(), Some(Tok::Dot)) {
                let span = self.bump().unwrap().1;
                let path = self.attr_path()?;
                let default = if matches!(self.peek(), Some(Tok::Or)) {
                    self.bump();
                    Some(self.select_expr()?)
                } else {
                    None
                };
                head = Rc::new(Expr::Select(head, path, default, span));
            } else if matches!(self.peek(), Some(Tok::Question)) {
                let span = self.bump().unwrap().1;
                let path = self.attr_path()?;
                head = Rc::new(Expr::HasAttr(head, path, span));
            } else {
                break;
            }
        }
        Ok(head)
    }

    fn atom(&mut self) -> ParseResult<Rc<Expr>> {
        match self.bump() {
            Some((Tok::Int(n), s)) => Ok(Rc::new(Expr::Constant(Atom::Int(n), s))),
            Some((Tok::True, s)) => Ok(Rc::new(Expr::Constant(Atom::Bool(true), s))),
            Some((Tok::False, s)) => Ok(Rc::new(Expr::Constant(Atom::Bool(false), s))),
            Some((Tok::Null, s)) => Ok(Rc::new(Expr::Constant(Atom::Null, s))),
            Some((Tok::Ident(name), s)) => Ok(Rc::new(Expr::Sym(NixString::from(name.as_str()), s))),
            Some((Tok::Path(p), s)) => Ok(Rc::new(Expr::LiteralPath(p, s))),
            Some((Tok::EnvPath(p), s)) => Ok(Rc::new(Expr::EnvPath(p, s))),
            Some((Tok::Str(parts), s)) => {
                let mut out = Vec::with_capacity(parts.len());
                for part in parts {
                    out.push(match part {
                        StrTok::Literal(lit) => StrPart::Literal(lit),
                        StrTok::Interp(tokens) => {
                            let mut inner = TokenParser { tokens, pos: 0, file: self.file.clone() };
                            let e = inner.expr()?;
                            inner.expect_end()?;
                            StrPart::Interpolation(e)
                        }
                    });
                }
                Ok(Rc::new(Expr::Str(out, s)))
            }
            Some((Tok::LParen, s)) => {
                let inner = self.expr()?;
                self.eat(&Tok::RParen)?;
                let _ = s;
                Ok(inner)
            }
            Some((Tok::LBracket, s)) => {
                let mut items = Vec::new();
                while !matches!(self.peek(), Some(Tok::RBracket)) {
                    items.push(self.select_expr_or_unary()?);
                }
                self.eat(&Tok::RBracket)?;
                Ok(Rc::new(Expr::List(items, s)))
            }
            Some((Tok::LBrace, s)) => {
                let bindings = self.bindings(&Tok::RBrace)?;
                self.eat(&Tok::RBrace)?;
                Ok(Rc::new(Expr::Set(bindings, s)))
            }
            Some((Tok::Rec, s)) => {
                self.eat(&Tok::LBrace)?;
                let bindings = self.bindings(&Tok::RBrace)?;
                self.eat(&Tok::RBrace)?;
                Ok(Rc::new(Expr::RecSet(bindings, s)))
            }
            Some((t, s)) => Err(ParseError { message: format!("unexpected token {t:?}"), span: s, incomplete: false }),
            None => Err(ParseError { message: "unexpected end of input".into(), span: self.peek_span(), incomplete: true }),
        }
    }

    /// List elements bind tighter than application (`[ f x ]` is a
    /// one-element list containing `f x`... in real Nix list elements
    /// are juxtaposition-free atoms; we allow unary/select but not bare
    /// application inside `[ ]`, matching that each element is written
    /// space-separated).
    fn select_expr_or_unary(&mut self) -> ParseResult<Rc<Expr>> {
        self.unary_expr_single()
    }

    fn unary_expr_single(&mut self) -> ParseResult<Rc<Expr>> {
        match self.peek() {
            Some(Tok::Minus) => {
                let span = self.bump().unwrap().1;
                let inner = self.select_expr()?;
                Ok(Rc::new(Expr::Unary(UnaryOp::Neg, inner, span)))
            }
            Some(Tok::Bang) => {
                let span = self.bump().unwrap().1;
                let inner = self.select_expr()?;
                Ok(Rc::new(Expr::Unary(UnaryOp::Not, inner, span)))
            }
            _ => self.select_expr(),
        }
    }
}
