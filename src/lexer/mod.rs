//! # Lexer
//!
//! Tokenizes assembly source into a stream of lexemes.
//!
//! ## Pipeline within this stage
//!
//! 1. Raw scan: left-to-right, dispatching on the leading character.
//! 2. Noise removal: runs of `Terminator` collapse to one; leading
//!    terminators are dropped.
//! 3. Find-mistakes: adjacent glued numeric literals (`01` lexed as `0`
//!    immediately followed by `1`) are reported with a fix-it hint.
//!
//! Per `spec.md` §7, the first error detected anywhere in this stage aborts
//! lexing and propagates to the caller.

pub mod cursor;
pub mod token;

#[cfg(test)]
mod tests;

use crate::error::{Error, Span};
use crate::mnemonic;
use cursor::Cursor;
use token::{Lexeme, LexemeKind};

const DIRECTIVE_KEYWORDS: &[(&str, fn() -> LexemeKind)] = &[
    ("section", || LexemeKind::SwitchToSection),
    ("text", || LexemeKind::SwitchToText),
    ("rodata", || LexemeKind::SwitchToRodata),
    ("symbol", || LexemeKind::DeclareSymbol),
    ("object", || LexemeKind::AllocateObject),
    ("begin", || LexemeKind::Begin),
    ("end", || LexemeKind::End),
];

pub fn tokenize(source: &str) -> Result<Vec<Lexeme>, Error> {
    let raw = scan(source)?;
    let cleaned = remove_noise(raw);
    find_mistakes(&cleaned)?;
    Ok(cleaned)
}

fn scan(source: &str) -> Result<Vec<Lexeme>, Error> {
    let mut cursor = Cursor::new(source);
    let mut lexemes = Vec::new();

    while !cursor.is_at_end() {
        if let Some(lexeme) = lex_one(&mut cursor)? {
            lexemes.push(lexeme);
        }
    }

    let (line, col) = cursor.current_pos();
    let pos = cursor.byte_pos();
    lexemes.push(Lexeme {
        kind: LexemeKind::Eof,
        text: String::new(),
        span: Span {
            start: pos,
            end: pos,
            line,
            col,
        },
    });

    Ok(lexemes)
}

fn lex_one(cursor: &mut Cursor) -> Result<Option<Lexeme>, Error> {
    while matches!(cursor.peek(), Some(' ' | '\t')) {
        cursor.advance();
    }
    if cursor.is_at_end() {
        return Ok(None);
    }

    let start_byte = cursor.byte_pos();
    let (line, col) = cursor.current_pos();
    let ch = cursor.peek().unwrap();

    match ch {
        '\n' | '\r' => {
            if ch == '\r' {
                cursor.advance();
                if cursor.peek() == Some('\n') {
                    cursor.advance();
                }
            } else {
                cursor.advance();
            }
            Ok(Some(Lexeme {
                kind: LexemeKind::Terminator,
                text: "\n".into(),
                span: cursor.make_span(start_byte, line, col),
            }))
        }
        ';' => {
            skip_line_comment(cursor);
            Ok(None)
        }
        '/' if cursor.peek_at(1) == Some('/') => {
            skip_line_comment(cursor);
            Ok(None)
        }
        ',' => single(cursor, start_byte, line, col, LexemeKind::Comma, ","),
        '$' => single(cursor, start_byte, line, col, LexemeKind::Dollar, "$"),
        '@' => single(cursor, start_byte, line, col, LexemeKind::At, "@"),
        '*' => single(cursor, start_byte, line, col, LexemeKind::Star, "*"),
        '=' => single(cursor, start_byte, line, col, LexemeKind::Eq, "="),
        '[' if cursor.peek_at(1) == Some('[') => {
            cursor.advance();
            cursor.advance();
            Ok(Some(Lexeme {
                kind: LexemeKind::AttrListOpen,
                text: "[[".into(),
                span: cursor.make_span(start_byte, line, col),
            }))
        }
        ']' if cursor.peek_at(1) == Some(']') => {
            cursor.advance();
            cursor.advance();
            Ok(Some(Lexeme {
                kind: LexemeKind::AttrListClose,
                text: "]]".into(),
                span: cursor.make_span(start_byte, line, col),
            }))
        }
        '.' => lex_dot(cursor, start_byte, line, col),
        '"' => lex_string(cursor, start_byte, line, col),
        '-' if matches!(cursor.peek_at(1), Some(c) if c.is_ascii_digit()) => {
            lex_number(cursor, start_byte, line, col)
        }
        c if c.is_ascii_digit() => lex_number(cursor, start_byte, line, col),
        c if c.is_ascii_alphabetic() || c == '_' => lex_word(cursor, start_byte, line, col),
        _ => {
            cursor.advance();
            Err(Error::invalid_token(
                cursor.make_span(start_byte, line, col),
                ch.to_string(),
            ))
        }
    }
}

fn single(
    cursor: &mut Cursor,
    start_byte: usize,
    line: usize,
    col: usize,
    kind: LexemeKind,
    text: &str,
) -> Result<Option<Lexeme>, Error> {
    cursor.advance();
    Ok(Some(Lexeme {
        kind,
        text: text.to_string(),
        span: cursor.make_span(start_byte, line, col),
    }))
}

fn skip_line_comment(cursor: &mut Cursor) {
    while let Some(ch) = cursor.peek() {
        if ch == '\n' || ch == '\r' {
            break;
        }
        cursor.advance();
    }
}

/// `.` is always lexed as a single-character `Dot` token (spec.md §4.1)
/// *unless* the alphabetic run immediately following it spells one of the
/// seven known directive keywords, in which case the whole `.keyword` is
/// lexed as a single dedicated lexeme — mirroring how the teacher's
/// `lex_directive` consumes `.ORIG` etc. as one token.
fn lex_dot(cursor: &mut Cursor, start_byte: usize, line: usize, col: usize) -> Result<Option<Lexeme>, Error> {
    let mut offset = 1;
    let mut word = String::new();
    while let Some(c) = cursor.peek_at(offset) {
        if c.is_ascii_alphabetic() {
            word.push(c);
            offset += 1;
        } else {
            break;
        }
    }

    if let Some((_, make_kind)) = DIRECTIVE_KEYWORDS.iter().find(|(name, _)| *name == word) {
        for _ in 0..=word.len() {
            cursor.advance();
        }
        return Ok(Some(Lexeme {
            kind: make_kind(),
            text: format!(".{word}"),
            span: cursor.make_span(start_byte, line, col),
        }));
    }

    cursor.advance();
    Ok(Some(Lexeme {
        kind: LexemeKind::Dot,
        text: ".".into(),
        span: cursor.make_span(start_byte, line, col),
    }))
}

fn lex_string(cursor: &mut Cursor, start_byte: usize, line: usize, col: usize) -> Result<Option<Lexeme>, Error> {
    cursor.advance();
    let mut value = String::new();

    loop {
        let Some(ch) = cursor.peek() else {
            return Err(Error::invalid_token(
                cursor.make_span(start_byte, line, col),
                "unterminated string literal".to_string(),
            ));
        };
        if ch == '\n' || ch == '\r' {
            return Err(Error::invalid_token(
                cursor.make_span(start_byte, line, col),
                "unterminated string literal".to_string(),
            ));
        }
        if ch == '"' {
            cursor.advance();
            break;
        }
        if ch == '\\' {
            cursor.advance();
            let Some(esc) = cursor.peek() else {
                return Err(Error::invalid_token(
                    cursor.make_span(start_byte, line, col),
                    "unterminated string literal".to_string(),
                ));
            };
            match esc {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                '\\' => value.push('\\'),
                '"' => value.push('"'),
                '0' => value.push('\0'),
                'x' => {
                    cursor.advance();
                    let mut hex = String::new();
                    for _ in 0..2 {
                        match cursor.peek() {
                            Some(c) if c.is_ascii_hexdigit() => {
                                hex.push(c);
                                cursor.advance();
                            }
                            _ => {
                                return Err(Error::invalid_token(
                                    cursor.make_span(start_byte, line, col),
                                    "invalid \\xNN escape".to_string(),
                                ))
                            }
                        }
                    }
                    let byte = u8::from_str_radix(&hex, 16).unwrap();
                    value.push(byte as char);
                    continue;
                }
                other => {
                    return Err(Error::invalid_token(
                        cursor.make_span(start_byte, line, col),
                        format!("invalid escape sequence \\{other}"),
                    ))
                }
            }
            cursor.advance();
        } else {
            value.push(ch);
            cursor.advance();
        }
    }

    Ok(Some(Lexeme {
        kind: LexemeKind::LiteralString(value),
        text: String::new(),
        span: cursor.make_span(start_byte, line, col),
    }))
}

fn lex_number(cursor: &mut Cursor, start_byte: usize, line: usize, col: usize) -> Result<Option<Lexeme>, Error> {
    let mut text = String::new();
    let negative = cursor.peek() == Some('-');
    if negative {
        text.push('-');
        cursor.advance();
    }

    let first_digit = cursor.advance().unwrap();
    text.push(first_digit);

    if first_digit == '0' {
        if let Some(radix_char @ ('x' | 'b' | 'o')) = cursor.peek() {
            let radix = match radix_char {
                'x' => 16,
                'b' => 2,
                _ => 8,
            };
            let valid_digit = |c: char| match radix {
                16 => c.is_ascii_hexdigit(),
                2 => c == '0' || c == '1',
                _ => ('0'..='7').contains(&c),
            };
            if matches!(cursor.peek_at(1), Some(c) if valid_digit(c)) {
                cursor.advance();
                text.push(radix_char);
                let mut digits = String::new();
                while matches!(cursor.peek(), Some(c) if valid_digit(c)) {
                    let c = cursor.advance().unwrap();
                    digits.push(c);
                    text.push(c);
                }
                let magnitude = i64::from_str_radix(&digits, radix).map_err(|_| {
                    Error::invalid_token(cursor.make_span(start_byte, line, col), text.clone())
                })?;
                let unsigned = consume_unsigned_suffix(cursor, &mut text);
                let value = if negative { -magnitude } else { magnitude };
                return Ok(Some(Lexeme {
                    kind: LexemeKind::LiteralInteger { value, unsigned },
                    text,
                    span: cursor.make_span(start_byte, line, col),
                }));
            }
        }
        // Bare "0" not followed by a radix prefix or another digit: falls
        // through to the plain-decimal path below, which for "0" is just
        // itself. A following digit (e.g. the second "0" in "00") is left
        // for the next lex_one call and caught by find_mistakes.
    } else {
        while matches!(cursor.peek(), Some(c) if c.is_ascii_digit()) {
            let c = cursor.advance().unwrap();
            text.push(c);
        }
    }

    if cursor.peek() == Some('.') && matches!(cursor.peek_at(1), Some(c) if c.is_ascii_digit()) {
        text.push(cursor.advance().unwrap());
        while matches!(cursor.peek(), Some(c) if c.is_ascii_digit()) {
            let c = cursor.advance().unwrap();
            text.push(c);
        }
        let value: f64 = text.parse().map_err(|_| {
            Error::invalid_token(cursor.make_span(start_byte, line, col), text.clone())
        })?;
        return Ok(Some(Lexeme {
            kind: LexemeKind::LiteralFloat(value),
            text,
            span: cursor.make_span(start_byte, line, col),
        }));
    }

    let digits_only = text.trim_start_matches('-');
    let magnitude: i64 = digits_only.parse().map_err(|_| {
        Error::invalid_token(cursor.make_span(start_byte, line, col), text.clone())
    })?;
    let unsigned = consume_unsigned_suffix(cursor, &mut text);
    let value = if negative { -magnitude } else { magnitude };

    Ok(Some(Lexeme {
        kind: LexemeKind::LiteralInteger { value, unsigned },
        text,
        span: cursor.make_span(start_byte, line, col),
    }))
}

fn consume_unsigned_suffix(cursor: &mut Cursor, text: &mut String) -> bool {
    if matches!(cursor.peek(), Some('u' | 'U')) {
        text.push(cursor.advance().unwrap());
        true
    } else {
        false
    }
}

fn lex_word(cursor: &mut Cursor, start_byte: usize, line: usize, col: usize) -> Result<Option<Lexeme>, Error> {
    let mut word = String::new();
    while matches!(cursor.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
        word.push(cursor.advance().unwrap());
    }

    // Greedy-prefixed opcode: "g" immediately followed by ".mnemonic" with
    // no intervening whitespace.
    if word == "g" && cursor.peek() == Some('.') {
        if let Some(tail) = peek_following_word(cursor, 1) {
            let combined = format!("g.{tail}");
            if mnemonic::is_known_mnemonic(&combined) {
                cursor.advance();
                for _ in 0..tail.len() {
                    cursor.advance();
                }
                return Ok(Some(Lexeme {
                    kind: LexemeKind::Opcode,
                    text: combined,
                    span: cursor.make_span(start_byte, line, col),
                }));
            }
        }
    }

    if cursor.peek() == Some(':') {
        cursor.advance();
        return Ok(Some(Lexeme {
            kind: LexemeKind::DefineLabel(word.clone()),
            text: word,
            span: cursor.make_span(start_byte, line, col),
        }));
    }

    let kind = if word == "void" {
        LexemeKind::Void
    } else if mnemonic::is_known_mnemonic(&word) {
        LexemeKind::Opcode
    } else {
        LexemeKind::LiteralAtom(word.clone())
    };

    Ok(Some(Lexeme {
        kind,
        text: word,
        span: cursor.make_span(start_byte, line, col),
    }))
}

/// Peek the alphanumeric/underscore run starting `offset` bytes ahead,
/// without consuming anything.
fn peek_following_word(cursor: &Cursor, offset: usize) -> Option<String> {
    let mut word = String::new();
    let mut i = offset;
    while let Some(c) = cursor.peek_at(i) {
        if c.is_ascii_alphanumeric() || c == '_' {
            word.push(c);
            i += 1;
        } else {
            break;
        }
    }
    if word.is_empty() {
        None
    } else {
        Some(word)
    }
}

fn remove_noise(lexemes: Vec<Lexeme>) -> Vec<Lexeme> {
    let mut cleaned = Vec::with_capacity(lexemes.len());
    let mut last_was_terminator = true; // drop leading terminators

    for lexeme in lexemes {
        if matches!(lexeme.kind, LexemeKind::Terminator) {
            if last_was_terminator {
                continue;
            }
            last_was_terminator = true;
        } else {
            last_was_terminator = false;
        }
        cleaned.push(lexeme);
    }

    cleaned
}

/// Detect two adjacent integer literals glued together with no separating
/// token, the classic `01`-meant-as-octal mistake.
fn find_mistakes(lexemes: &[Lexeme]) -> Result<(), Error> {
    for pair in lexemes.windows(2) {
        let [a, b] = pair else { continue };
        if let (LexemeKind::LiteralInteger { .. }, LexemeKind::LiteralInteger { .. }) =
            (&a.kind, &b.kind)
        {
            if a.span.end == b.span.start {
                return Err(Error::invalid_token(a.span, format!("{}{}", a.text, b.text))
                    .with_extra(b.span)
                    .with_note("write octal literals with an explicit `0o` prefix"));
            }
        }
    }
    Ok(())
}
