// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for the cellflow cell language.
//!
//! Tokenization uses logos. Design notes:
//!
//! - Newlines are tokens: they terminate statements (as does `;`).
//!   All other whitespace is skipped.
//! - `#` comments are stripped during lexing (not tokens).
//! - Reactivity sigils `$`, `$$`, `~` are their own tokens; the parser
//!   attaches them to the following name.

use std::ops::Range;

use logos::Logos;

/// Cell-language token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")] // Skip whitespace except newlines
#[logos(skip r"#[^\n]*")] // Skip # comments
pub enum Token {
    // === Statement separators ===
    /// End of line; terminates a statement.
    #[token("\n")]
    Newline,
    /// `;` statement separator
    #[token(";")]
    Semi,

    // === Keywords ===
    /// Keyword `def`
    #[token("def")]
    Def,
    /// Keyword `class`
    #[token("class")]
    Class,
    /// Keyword `for`
    #[token("for")]
    For,
    /// Keyword `in`
    #[token("in")]
    In,
    /// Keyword `while`
    #[token("while")]
    While,
    /// Keyword `if`
    #[token("if")]
    If,
    /// Keyword `else`
    #[token("else")]
    Else,
    /// Keyword `return`
    #[token("return")]
    Return,
    /// Keyword `del`
    #[token("del")]
    Del,
    /// Keyword `import`
    #[token("import")]
    Import,
    /// Keyword `as`
    #[token("as")]
    As,
    /// Keyword `lambda`
    #[token("lambda")]
    Lambda,
    /// Keyword `and`
    #[token("and")]
    And,
    /// Keyword `or`
    #[token("or")]
    Or,
    /// Keyword `not`
    #[token("not")]
    Not,
    /// Literal `True`
    #[token("True")]
    True,
    /// Literal `False`
    #[token("False")]
    False,
    /// Literal `None`
    #[token("None")]
    None,

    // === Reactivity sigils ===
    /// `$$` cascading-reactive sigil (before `$` so it wins the longer match)
    #[token("$$")]
    CascadeSigil,
    /// `$` reactive sigil
    #[token("$")]
    ReactiveSigil,
    /// `~` blocking sigil
    #[token("~")]
    BlockSigil,

    // === Operators ===
    /// `=`
    #[token("=")]
    Assign,
    /// `+=`
    #[token("+=")]
    PlusAssign,
    /// `-=`
    #[token("-=")]
    MinusAssign,
    /// `*=`
    #[token("*=")]
    StarAssign,
    /// `/=`
    #[token("/=")]
    SlashAssign,
    /// `==`
    #[token("==")]
    EqEq,
    /// `!=`
    #[token("!=")]
    NotEq,
    /// `<=`
    #[token("<=")]
    LtEq,
    /// `>=`
    #[token(">=")]
    GtEq,
    /// `<`
    #[token("<")]
    Lt,
    /// `>`
    #[token(">")]
    Gt,
    /// `+`
    #[token("+")]
    Plus,
    /// `-`
    #[token("-")]
    Minus,
    /// `**`
    #[token("**")]
    DoubleStar,
    /// `*`
    #[token("*")]
    Star,
    /// `/`
    #[token("/")]
    Slash,
    /// `%`
    #[token("%")]
    Percent,

    // === Delimiters ===
    /// `.`
    #[token(".")]
    Dot,
    /// `,`
    #[token(",")]
    Comma,
    /// `:`
    #[token(":")]
    Colon,
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `[`
    #[token("[")]
    LBracket,
    /// `]`
    #[token("]")]
    RBracket,
    /// `{`
    #[token("{")]
    LBrace,
    /// `}`
    #[token("}")]
    RBrace,

    // === Literals & identifiers ===
    /// Identifier
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    /// Float literal
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
    /// Integer literal
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    /// String literal (double-quoted, backslash escapes)
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),
}

/// Strip quotes and resolve backslash escapes.
fn unescape(quoted: &str) -> Option<String> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                '\\' => out.push('\\'),
                '"' => out.push('"'),
                other => out.push(other),
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Error for an unlexable byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// Byte range of the offending input.
    pub span: Range<usize>,
}

/// Tokenize a cell source into `(token, byte range)` pairs.
pub fn lex(source: &str) -> Result<Vec<(Token, Range<usize>)>, LexError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => return Err(LexError { span }),
        }
    }
    Ok(tokens)
}
