use super::tokenize;
use super::token::LexemeKind;

#[test]
fn tokenizes_section_directive() {
    let lexemes = tokenize(".section \"text\"\n").unwrap();
    assert_eq!(lexemes[0].kind, LexemeKind::SwitchToSection);
    assert!(matches!(lexemes[1].kind, LexemeKind::LiteralString(ref s) if s == "text"));
}

#[test]
fn tokenizes_label_definition() {
    let lexemes = tokenize("main:\n    return\n").unwrap();
    assert_eq!(lexemes[0].kind, LexemeKind::DefineLabel("main".to_string()));
    assert_eq!(lexemes[1].kind, LexemeKind::Opcode);
}

#[test]
fn tokenizes_register_access_with_set_suffix() {
    let lexemes = tokenize("$1.a\n").unwrap();
    assert_eq!(lexemes[0].kind, LexemeKind::Dollar);
    assert!(matches!(lexemes[1].kind, LexemeKind::LiteralInteger { value: 1, .. }));
    assert_eq!(lexemes[2].kind, LexemeKind::Dot);
    assert!(matches!(lexemes[3].kind, LexemeKind::LiteralAtom(ref s) if s == "a"));
}

#[test]
fn tokenizes_greedy_opcode_prefix() {
    let lexemes = tokenize("g.call void, @helper\n").unwrap();
    assert_eq!(lexemes[0].kind, LexemeKind::Opcode);
    assert_eq!(lexemes[0].text, "g.call");
}

#[test]
fn collapses_runs_of_terminators_and_drops_leading_ones() {
    let lexemes = tokenize("\n\n\nreturn\n\n\n").unwrap();
    let terminators = lexemes
        .iter()
        .filter(|l| l.kind == LexemeKind::Terminator)
        .count();
    assert_eq!(terminators, 1);
}

#[test]
fn rejects_glued_numeric_literals() {
    let err = tokenize("li $1, 01\n").unwrap_err();
    assert!(err.note.unwrap().contains("0o"));
}

#[test]
fn accepts_unsigned_sentinel_minus_one() {
    let lexemes = tokenize("-1u\n").unwrap();
    assert!(matches!(
        lexemes[0].kind,
        LexemeKind::LiteralInteger {
            value: -1,
            unsigned: true
        }
    ));
}

#[test]
fn tokenizes_hex_literal() {
    let lexemes = tokenize("0xdeadbeef\n").unwrap();
    assert!(matches!(
        lexemes[0].kind,
        LexemeKind::LiteralInteger {
            value: 0xdeadbeef,
            ..
        }
    ));
}

#[test]
fn tokenizes_float_literal() {
    let lexemes = tokenize("3.5\n").unwrap();
    assert!(matches!(lexemes[0].kind, LexemeKind::LiteralFloat(v) if v == 3.5));
}

#[test]
fn line_comments_produce_no_lexeme() {
    let lexemes = tokenize("; a comment\nreturn\n").unwrap();
    assert_eq!(lexemes[0].kind, LexemeKind::Opcode);
}
