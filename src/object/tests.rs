use super::materialize;
use crate::lexer::tokenize;
use crate::parser::ast::{OperandKind, Payload};
use crate::parser::parse;
use crate::symtab::collect;

fn build(source: &str) -> (Vec<crate::parser::ast::Node>, crate::symtab::SymbolTable) {
    let lexemes = tokenize(source).expect("lex");
    let nodes = parse(&lexemes).expect("parse");
    let symtab = collect(&nodes).expect("collect");
    (nodes, symtab)
}

#[test]
fn string_object_fills_value_and_size() {
    let (mut nodes, mut symtab) = build(
        ".section \"rodata\"\n.symbol greeting\ngreeting:\n.object string \"hi\"\n",
    );
    let rodata = materialize(&mut nodes, &mut symtab).unwrap();
    let idx = symtab.lookup("greeting").unwrap();
    let sym = symtab.get(idx);
    assert_eq!(sym.value, super::RESERVED_PREFIX as u64);
    assert_eq!(sym.size, 2);
    assert_eq!(&rodata[super::RESERVED_PREFIX..], b"hi");
}

#[test]
fn repetition_constructor_concatenates_bytes() {
    let (mut nodes, mut symtab) = build(
        ".section \"rodata\"\n.symbol pad\npad:\n.object string 2 * \"ab\"\n",
    );
    let rodata = materialize(&mut nodes, &mut symtab).unwrap();
    assert_eq!(&rodata[super::RESERVED_PREFIX..], b"abab");
}

#[test]
fn inline_atom_literal_creates_anonymous_symbol_and_rewrites_operand() {
    let (mut nodes, mut symtab) = build(
        ".section \"text\"\n.symbol main\nmain:\n    atom $0, \"tag\"\n    return\n",
    );
    let before = symtab.len();
    materialize(&mut nodes, &mut symtab).unwrap();
    assert_eq!(symtab.len(), before + 1);

    let Payload::Instruction { operands, .. } = &nodes
        .iter()
        .find(|n| matches!(&n.payload, Payload::Instruction { mnemonic, .. } if mnemonic == "atom"))
        .unwrap()
        .payload
    else {
        panic!("expected instruction node");
    };
    assert!(matches!(operands[1].kind, OperandKind::SymbolIndex(_)));
}

#[test]
fn inline_double_literal_materializes_eight_bytes() {
    let (mut nodes, mut symtab) = build(
        ".section \"text\"\n.symbol main\nmain:\n    double $0, 3.5\n    return\n",
    );
    let rodata = materialize(&mut nodes, &mut symtab).unwrap();
    assert_eq!(rodata.len(), super::RESERVED_PREFIX + 8);
    assert_eq!(
        f64::from_le_bytes(rodata[super::RESERVED_PREFIX..].try_into().unwrap()),
        3.5
    );
}

#[test]
fn object_allocation_without_preceding_label_is_an_error() {
    let (mut nodes, mut symtab) = build(".section \"rodata\"\n.object string \"hi\"\n");
    let err = materialize(&mut nodes, &mut symtab).unwrap_err();
    assert!(err.message.contains("must follow a label"));
}
