use super::ast::{OperandKind, Payload};
use super::parse;
use crate::error::Cause;
use crate::isa::RegisterSet;
use crate::lexer::tokenize;

fn nodes(source: &str) -> Vec<super::ast::Node> {
    let lexemes = tokenize(source).expect("lex");
    parse(&lexemes).expect("parse")
}

#[test]
fn parses_section_switch() {
    let nodes = nodes(".section \"text\"\n");
    match &nodes[0].payload {
        Payload::Section { name } => assert_eq!(name, "text"),
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn parses_entry_point_symbol_with_attribute() {
    let nodes = nodes(".symbol [[entry_point]] main\n");
    assert!(nodes[0].has_attr("entry_point"));
    match &nodes[0].payload {
        Payload::Symbol { name } => assert_eq!(name, "main"),
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn parses_label_and_instruction() {
    let nodes = nodes("main:\n    return\n");
    assert!(matches!(nodes[0].payload, Payload::Label { .. }));
    match &nodes[1].payload {
        Payload::Instruction { mnemonic, operands, .. } => {
            assert_eq!(mnemonic, "return");
            assert!(operands.is_empty());
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn parses_register_operand_with_explicit_set() {
    let nodes = nodes("move $1.a, $0\n");
    match &nodes[0].payload {
        Payload::Instruction { operands, .. } => {
            assert_eq!(
                operands[0].kind,
                OperandKind::Register {
                    direct: true,
                    set: RegisterSet::Argument,
                    index: 1
                }
            );
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn parses_call_with_void_and_label_operands() {
    let nodes = nodes("call void, @helper\n");
    match &nodes[0].payload {
        Payload::Instruction { mnemonic, operands, .. } => {
            assert_eq!(mnemonic, "call");
            assert_eq!(operands[0].kind, OperandKind::Void);
            assert_eq!(operands[1].kind, OperandKind::Label("helper".to_string()));
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn parses_object_allocation_with_string_constructor() {
    let nodes = nodes(".object string \"hi\"\n");
    match &nodes[0].payload {
        Payload::Object { ty, ctor } => {
            assert_eq!(ty, "string");
            assert_eq!(ctor.len(), 1);
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn trailing_comma_before_terminator_is_an_error() {
    let lexemes = tokenize("move $1,\n").unwrap();
    let err = parse(&lexemes).unwrap_err();
    assert!(err.note.unwrap().contains("operand to follow a comma"));
}

#[test]
fn misspelled_opcode_suggests_correction() {
    let lexemes = tokenize("retrun\n").unwrap();
    let err = parse(&lexemes).unwrap_err();
    assert_eq!(err.cause, Cause::UnknownOpcode);
    assert!(err.aside.unwrap().contains("return"));
}

#[test]
fn register_index_256_is_rejected() {
    let lexemes = tokenize("move $256, $0\n").unwrap();
    let err = parse(&lexemes).unwrap_err();
    assert_eq!(err.cause, Cause::InvalidRegisterAccess);
}
