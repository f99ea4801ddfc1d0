//! Lexer for the template language using logos
//!
//! Template source is a mix of raw text and delimited regions: `{{ ... }}`
//! output blocks, `{% ... %}` tag blocks and `{# ... #}` comments. A scanner
//! splits the source into segments, then region interiors are tokenized with
//! logos. Whitespace-control modifiers (`{%-`, `-%}` and friends) trim the
//! adjacent raw text.

use logos::Logos;

use crate::error::ParseError;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Tokens produced inside `{{ ... }}` and `{% ... %}` regions
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
enum RawToken {
    // Tag keywords
    #[token("extends")]
    Extends,
    #[token("include")]
    Include,
    #[token("import")]
    Import,
    #[token("embed")]
    Embed,
    #[token("endembed")]
    EndEmbed,
    #[token("if")]
    If,
    #[token("elseif")]
    ElseIf,
    #[token("else")]
    Else,
    #[token("endif")]
    EndIf,
    #[token("block")]
    Block,
    #[token("endblock")]
    EndBlock,
    #[token("set")]
    Set,

    // Modifier keywords
    #[token("as")]
    As,
    #[token("with")]
    With,
    #[token("only")]
    Only,
    #[token("ignore")]
    Ignore,
    #[token("missing")]
    Missing,

    // Expression keywords
    #[token("not")]
    Not,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // Delimiters
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    // Operators (longer patterns first)
    #[token("?:")]
    QuestionColon,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("=")]
    Assign,
    #[token("|")]
    Pipe,
    #[token("~")]
    Tilde,

    // Literals - identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    String(String),

    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),
}

/// Tokens consumed by the parser: raw text, region delimiters and the
/// interior tokens above
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    OutputOpen,
    OutputClose,
    TagOpen,
    TagClose,
    Extends,
    Include,
    Import,
    Embed,
    EndEmbed,
    If,
    ElseIf,
    Else,
    EndIf,
    Block,
    EndBlock,
    Set,
    As,
    With,
    Only,
    Ignore,
    Missing,
    Not,
    True,
    False,
    Null,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    BraceOpen,
    BraceClose,
    Comma,
    Dot,
    QuestionColon,
    Question,
    Colon,
    Eq,
    NotEq,
    Assign,
    Pipe,
    Tilde,
    Ident(String),
    String(String),
    Number(f64),
}

impl From<RawToken> for Token {
    fn from(raw: RawToken) -> Self {
        match raw {
            RawToken::Extends => Token::Extends,
            RawToken::Include => Token::Include,
            RawToken::Import => Token::Import,
            RawToken::Embed => Token::Embed,
            RawToken::EndEmbed => Token::EndEmbed,
            RawToken::If => Token::If,
            RawToken::ElseIf => Token::ElseIf,
            RawToken::Else => Token::Else,
            RawToken::EndIf => Token::EndIf,
            RawToken::Block => Token::Block,
            RawToken::EndBlock => Token::EndBlock,
            RawToken::Set => Token::Set,
            RawToken::As => Token::As,
            RawToken::With => Token::With,
            RawToken::Only => Token::Only,
            RawToken::Ignore => Token::Ignore,
            RawToken::Missing => Token::Missing,
            RawToken::Not => Token::Not,
            RawToken::True => Token::True,
            RawToken::False => Token::False,
            RawToken::Null => Token::Null,
            RawToken::ParenOpen => Token::ParenOpen,
            RawToken::ParenClose => Token::ParenClose,
            RawToken::BracketOpen => Token::BracketOpen,
            RawToken::BracketClose => Token::BracketClose,
            RawToken::BraceOpen => Token::BraceOpen,
            RawToken::BraceClose => Token::BraceClose,
            RawToken::Comma => Token::Comma,
            RawToken::Dot => Token::Dot,
            RawToken::QuestionColon => Token::QuestionColon,
            RawToken::Question => Token::Question,
            RawToken::Colon => Token::Colon,
            RawToken::Eq => Token::Eq,
            RawToken::NotEq => Token::NotEq,
            RawToken::Assign => Token::Assign,
            RawToken::Pipe => Token::Pipe,
            RawToken::Tilde => Token::Tilde,
            RawToken::Ident(s) => Token::Ident(s),
            RawToken::String(s) => Token::String(s),
            RawToken::Number(n) => Token::Number(n),
        }
    }
}

/// Strip surrounding quotes and resolve backslash escapes
fn unescape(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Kind of delimited region found by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Output,
    Tag,
    Comment,
}

impl Region {
    fn close_pattern(self) -> &'static str {
        match self {
            Region::Output => "}}",
            Region::Tag => "%}",
            Region::Comment => "#}",
        }
    }

    fn open_pattern(self) -> &'static str {
        match self {
            Region::Output => "{{",
            Region::Tag => "{%",
            Region::Comment => "{#",
        }
    }
}

/// Find the next region opener at or after `from`
fn find_opener(input: &str, from: usize) -> Option<(usize, Region)> {
    let mut search = from;
    while let Some(rel) = input[search..].find('{') {
        let at = search + rel;
        let rest = &input[at..];
        if rest.starts_with("{{") {
            return Some((at, Region::Output));
        }
        if rest.starts_with("{%") {
            return Some((at, Region::Tag));
        }
        if rest.starts_with("{#") {
            return Some((at, Region::Comment));
        }
        search = at + 1;
    }
    None
}

/// Find the closing delimiter for a region, skipping quoted strings.
///
/// Returns (interior end, end of the closing delimiter, whitespace-trim flag
/// for the following text).
fn find_close(input: &str, from: usize, region: Region) -> Option<(usize, usize, bool)> {
    let pat = region.close_pattern().as_bytes();
    let bytes = input.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == q {
                    quote = None;
                }
                i += 1;
            }
            None => {
                if region != Region::Comment && (b == b'"' || b == b'\'') {
                    quote = Some(b);
                    i += 1;
                    continue;
                }
                if b == b'-' && bytes[i + 1..].starts_with(pat) {
                    return Some((i, i + 1 + pat.len(), true));
                }
                if bytes[i..].starts_with(pat) {
                    return Some((i, i + pat.len(), false));
                }
                i += 1;
            }
        }
    }
    None
}

/// Tokenize a region interior, offsetting spans into the full source
fn lex_interior(
    input: &str,
    start: usize,
    end: usize,
    tokens: &mut Vec<(Token, Span)>,
) -> Result<(), ParseError> {
    let interior = &input[start..end];
    for (result, span) in RawToken::lexer(interior).spanned() {
        let span = start + span.start..start + span.end;
        match result {
            Ok(raw) => tokens.push((raw.into(), span)),
            Err(()) => {
                return Err(ParseError::Syntax {
                    message: format!("Unexpected character '{}'", &input[span.clone()]),
                    span,
                    expected: vec![],
                });
            }
        }
    }
    Ok(())
}

/// Push a raw text segment, applying whitespace-control trims
fn push_text(
    slice: &str,
    start: usize,
    trim_start: bool,
    trim_end: bool,
    tokens: &mut Vec<(Token, Span)>,
) {
    let mut text = slice;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        tokens.push((Token::Text(text.to_string()), start..start + slice.len()));
    }
}

/// Lex template source into tokens with spans
pub fn lex(input: &str) -> Result<Vec<(Token, Span)>, ParseError> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut trim_next_text = false;
    loop {
        match find_opener(input, pos) {
            None => {
                push_text(&input[pos..], pos, trim_next_text, false, &mut tokens);
                break;
            }
            Some((at, region)) => {
                let after_open = at + 2;
                let (trim_prev, inner_start) = if input[after_open..].starts_with('-') {
                    (true, after_open + 1)
                } else {
                    (false, after_open)
                };
                push_text(&input[pos..at], pos, trim_next_text, trim_prev, &mut tokens);
                let (inner_end, close_end, trim_after) = find_close(input, inner_start, region)
                    .ok_or_else(|| ParseError::Syntax {
                        span: at..input.len(),
                        message: format!("Unclosed '{}'", region.open_pattern()),
                        expected: vec![region.close_pattern().to_string()],
                    })?;
                match region {
                    Region::Comment => {}
                    Region::Output => {
                        tokens.push((Token::OutputOpen, at..inner_start));
                        lex_interior(input, inner_start, inner_end, &mut tokens)?;
                        tokens.push((Token::OutputClose, inner_end..close_end));
                    }
                    Region::Tag => {
                        tokens.push((Token::TagOpen, at..inner_start));
                        lex_interior(input, inner_start, inner_end, &mut tokens)?;
                        tokens.push((Token::TagClose, inner_end..close_end));
                    }
                }
                trim_next_text = trim_after;
                pos = close_end;
            }
        }
    }
    Ok(tokens)
}
