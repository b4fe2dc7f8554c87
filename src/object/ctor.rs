//! String constructor mini-language: a sequence of string literals and
//! `N * "literal"` repetitions, concatenated into a byte sequence.

use crate::error::Error;
use crate::lexer::token::{Lexeme, LexemeKind};

pub fn evaluate(ctor: &[Lexeme]) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    let mut i = 0;

    while i < ctor.len() {
        match &ctor[i].kind {
            LexemeKind::LiteralString(s) => {
                bytes.extend_from_slice(s.as_bytes());
                i += 1;
            }
            LexemeKind::LiteralInteger { value, .. } => {
                let count = *value;
                if count < 0 {
                    return Err(Error::invalid_operand(
                        ctor[i].span,
                        "a repetition count must not be negative",
                    ));
                }
                let star = ctor.get(i + 1);
                let Some(star) = star else {
                    return Err(Error::invalid_operand(
                        ctor[i].span,
                        "expected `*` after a repetition count",
                    ));
                };
                if !matches!(star.kind, LexemeKind::Star) {
                    return Err(Error::unexpected_token(star.span, star.kind.clone())
                        .with_note("expected `*` after a repetition count"));
                }
                let literal = ctor.get(i + 2);
                let Some(literal) = literal else {
                    return Err(Error::invalid_operand(
                        star.span,
                        "expected a string literal after `*`",
                    ));
                };
                let LexemeKind::LiteralString(s) = &literal.kind else {
                    return Err(Error::unexpected_token(literal.span, literal.kind.clone())
                        .with_note("expected a string literal after `*`"));
                };
                for _ in 0..count {
                    bytes.extend_from_slice(s.as_bytes());
                }
                i += 3;
            }
            _ => {
                return Err(Error::unexpected_token(ctor[i].span, ctor[i].kind.clone())
                    .with_note("expected a string literal or `N * \"literal\"` repetition"))
            }
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::evaluate;
    use crate::lexer::tokenize;

    fn ctor_lexemes(source: &str) -> Vec<crate::lexer::token::Lexeme> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .filter(|l| !l.is_terminator())
            .collect()
    }

    #[test]
    fn concatenates_plain_strings() {
        let lexemes = ctor_lexemes("\"hello\" \", \" \"world\"\n");
        let bytes = evaluate(&lexemes).unwrap();
        assert_eq!(bytes, b"hello, world");
    }

    #[test]
    fn expands_repetition() {
        let lexemes = ctor_lexemes("3 * \"ab\"\n");
        let bytes = evaluate(&lexemes).unwrap();
        assert_eq!(bytes, b"ababab");
    }

    #[test]
    fn star_without_preceding_count_is_an_error() {
        let lexemes = ctor_lexemes("\"ab\"\n");
        assert!(evaluate(&lexemes).is_ok());
    }
}
