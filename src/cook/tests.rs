use super::cook;
use crate::error::Cause;
use crate::isa::{Encoded, Opcode, SCRATCH_REGISTER};
use crate::lexer::tokenize;
use crate::object::materialize;
use crate::parser::parse;
use crate::symtab::collect;

fn build(source: &str) -> Vec<u64> {
    let lexemes = tokenize(source).expect("lex");
    let mut nodes = parse(&lexemes).expect("parse");
    let mut symtab = collect(&nodes).expect("collect");
    materialize(&mut nodes, &mut symtab).expect("materialize");
    cook(&nodes, &mut symtab).expect("cook")
}

fn build_err(source: &str) -> crate::error::Error {
    let lexemes = tokenize(source).expect("lex");
    let mut nodes = parse(&lexemes).expect("parse");
    let mut symtab = collect(&nodes).expect("collect");
    materialize(&mut nodes, &mut symtab).expect("materialize");
    cook(&nodes, &mut symtab).unwrap_err()
}

#[test]
fn buffer_is_bookended_by_halt_words() {
    let words = build(".section \"text\"\n.symbol main\nmain:\n    return\n");
    let halt = Encoded::N { op: Opcode::Halt, greedy: false }.pack();
    assert_eq!(words.first(), Some(&halt));
    assert_eq!(words.last(), Some(&halt));
}

#[test]
fn li_short_form_emits_single_addi_word() {
    let words = build(".section \"text\"\n.symbol main\nmain:\n    li $0, 5\n    return\n");
    // halt, addi, return, halt
    assert_eq!(words.len(), 4);
    match Encoded::unpack(words[1]).unwrap() {
        Encoded::R { op, imm, .. } => {
            assert_eq!(op, Opcode::Addi);
            assert_eq!(imm, 5);
        }
        other => panic!("expected R format, got {other:?}"),
    }
}

#[test]
fn li_long_form_emits_lui_and_lli() {
    let words = build(".section \"text\"\n.symbol main\nmain:\n    li $0, 1099511627776\n    return\n");
    assert_eq!(words.len(), 5);
    assert!(matches!(Encoded::unpack(words[1]).unwrap(), Encoded::F { op: Opcode::Lui, .. }));
    assert!(matches!(Encoded::unpack(words[2]).unwrap(), Encoded::F { op: Opcode::Lli, .. }));
}

#[test]
fn forced_full_attribute_uses_long_form_for_small_value() {
    let words = build(".section \"text\"\n.symbol main\nmain:\n    [[full]] li $0, 1\n    return\n");
    assert!(matches!(Encoded::unpack(words[1]).unwrap(), Encoded::F { op: Opcode::Lui, .. }));
}

#[test]
fn delete_rewrites_to_move_void_source() {
    let words = build(".section \"text\"\n.symbol main\nmain:\n    delete $1\n    return\n");
    match Encoded::unpack(words[1]).unwrap() {
        Encoded::D { op, a, b } => {
            assert_eq!(op, Opcode::Move);
            assert_eq!(a.index, 0);
            assert_eq!(b.index, 1);
        }
        other => panic!("expected D format, got {other:?}"),
    }
}

#[test]
fn if_resolves_jump_label_through_scratch_register() {
    let words = build(
        ".section \"text\"\n.symbol main\nmain:\n    if $0, @loop\nloop:\n    return\n",
    );
    let if_word = words
        .iter()
        .find_map(|w| match Encoded::unpack(*w) {
            Some(Encoded::D { op: Opcode::If, a, b }) => Some((a, b)),
            _ => None,
        })
        .expect("an IF word");
    assert_eq!(if_word.0.index, 0);
    assert_eq!(if_word.1.index, SCRATCH_REGISTER);
}

#[test]
fn if_targeting_callable_function_is_rejected() {
    let err = build_err(
        ".section \"text\"\n.symbol main\nmain:\n    if $0, @helper\n.symbol helper\nhelper:\n    return\n",
    );
    assert_eq!(err.cause, Cause::InvalidReference);
}

#[test]
fn call_targeting_jump_label_is_rejected() {
    let err = build_err(
        ".section \"text\"\n.symbol main\nmain:\n    call void, @loop\nloop:\n    return\n",
    );
    assert_eq!(err.cause, Cause::InvalidReference);
}

#[test]
fn if_to_undefined_label_is_a_jump_to_undefined_label() {
    let err = build_err(".section \"text\"\n.symbol main\nmain:\n    if $0, @nowhere\n");
    assert_eq!(err.cause, Cause::JumpToUndefinedLabel);
}

#[test]
fn call_to_undefined_label_is_a_call_to_undefined_function() {
    let err = build_err(".section \"text\"\n.symbol main\nmain:\n    call void, @nowhere\n");
    assert_eq!(err.cause, Cause::CallToUndefinedFunction);
}

#[test]
fn call_to_callable_function_with_void_return_uses_scratch_register() {
    let words = build(
        ".section \"text\"\n.symbol main\nmain:\n    call void, @helper\n    return\n.symbol helper\nhelper:\n    return\n",
    );
    let call_word = words
        .iter()
        .find_map(|w| match Encoded::unpack(*w) {
            Some(Encoded::D { op: Opcode::Call, a, b }) => Some((a, b)),
            _ => None,
        })
        .expect("a CALL word");
    assert_eq!(call_word.1.index, SCRATCH_REGISTER);
}

#[test]
fn memory_store_byte_rewrites_to_generic_m_format() {
    let words = build(".section \"text\"\n.symbol main\nmain:\n    sb $0, $1, 4\n    return\n");
    match Encoded::unpack(words[1]).unwrap() {
        Encoded::M { op, unit, offset, .. } => {
            assert_eq!(op, Opcode::Store);
            assert_eq!(unit, crate::isa::Unit::Byte);
            assert_eq!(offset, 4);
        }
        other => panic!("expected M format, got {other:?}"),
    }
}

#[test]
fn addi_with_unsigned_literal_sets_unsigned_flag() {
    let words = build(".section \"text\"\n.symbol main\nmain:\n    addi $0, $1, 7u\n    return\n");
    match Encoded::unpack(words[1]).unwrap() {
        Encoded::R { unsigned, .. } => assert!(unsigned),
        other => panic!("expected R format, got {other:?}"),
    }
}

#[test]
fn negative_unsigned_immediate_other_than_sentinel_is_rejected() {
    let err = build_err(".section \"text\"\n.symbol main\nmain:\n    addi $0, $1, -5u\n    return\n");
    assert_eq!(err.cause, Cause::ValueOutOfRange);
}

#[test]
fn cast_rewrites_type_name_to_numeric_code() {
    let words = build(".section \"text\"\n.symbol main\nmain:\n    cast $0, int\n    return\n");
    match Encoded::unpack(words[1]).unwrap() {
        Encoded::F { op, imm, .. } => {
            assert_eq!(op, Opcode::Cast);
            assert_eq!(imm, 0);
        }
        other => panic!("expected F format, got {other:?}"),
    }
}

#[test]
fn second_function_closes_first_functions_size() {
    let lexemes = tokenize(".section \"text\"\n.symbol one\none:\n    return\n.symbol two\ntwo:\n    return\n").unwrap();
    let mut nodes = parse(&lexemes).unwrap();
    let mut symtab = collect(&nodes).unwrap();
    materialize(&mut nodes, &mut symtab).unwrap();
    cook(&nodes, &mut symtab).unwrap();

    let one = symtab.get(symtab.lookup("one").unwrap());
    let two = symtab.get(symtab.lookup("two").unwrap());
    assert_eq!(one.value, 8);
    assert_eq!(one.size, 8);
    assert_eq!(two.value, 16);
    assert_eq!(two.size, 8);
}
