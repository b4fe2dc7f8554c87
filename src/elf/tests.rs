use super::*;
use crate::cook::cook;
use crate::lexer::tokenize;
use crate::object::materialize;
use crate::parser::parse;
use crate::symtab::collect;

fn assemble(source: &str) -> Result<Vec<u8>, Error> {
    let lexemes = tokenize(source).expect("lex");
    let mut nodes = parse(&lexemes).expect("parse");
    let mut symtab = collect(&nodes).expect("collect");
    let rodata = materialize(&mut nodes, &mut symtab).expect("materialize");
    let text = cook(&nodes, &mut symtab).expect("cook");
    write(ObjectInput {
        text: &text,
        rodata: &rodata,
        symtab: &symtab,
    })
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(bytes[at..at + 2].try_into().unwrap())
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

#[test]
fn minimal_executable_has_an_exec_type_and_entry_point() {
    let bytes = assemble(
        ".section \"text\"\n[[entry_point]]\n.symbol main\nmain:\n    return\n",
    )
    .unwrap();
    assert_eq!(&bytes[0..4], &[0x7F, b'E', b'L', b'F']);
    assert_eq!(bytes[4], ELFCLASS64);
    assert_eq!(bytes[7], ELFOSABI_STANDALONE);
    assert_eq!(read_u16(&bytes, 16), ET_EXEC);
    let e_entry = read_u64(&bytes, 24);
    assert!(e_entry > 0);
}

#[test]
fn relocatable_object_without_entry_point_has_rel_type() {
    let bytes = assemble(".section \"text\"\n.symbol helper\nhelper:\n    return\n").unwrap();
    assert_eq!(read_u16(&bytes, 16), ET_REL);
    assert_eq!(read_u64(&bytes, 24), 0);
}

#[test]
fn shstrtab_is_the_last_section() {
    let bytes = assemble(".section \"text\"\n.symbol main\nmain:\n    return\n").unwrap();
    let e_shstrndx = read_u16(&bytes, 62);
    assert_eq!(e_shstrndx, 9);
}

#[test]
fn duplicate_entry_points_are_rejected() {
    let err = assemble(
        ".section \"text\"\n[[entry_point]]\n.symbol main\nmain:\n    return\n[[entry_point]]\n.symbol other\nother:\n    return\n",
    )
    .unwrap_err();
    assert_eq!(err.cause, Cause::DuplicatedEntryPoint);
}

#[test]
fn extern_declaration_with_zero_value_and_size_is_accepted() {
    assemble(".section \"text\"\n[[entry_point]]\n.symbol main\nmain:\n    return\n[[extern]]\n.symbol helper\n")
        .unwrap();
}

#[test]
fn non_extern_symbol_without_a_body_is_rejected() {
    let err = assemble(".section \"text\"\n.symbol orphan\n[[entry_point]]\n.symbol main\nmain:\n    return\n")
        .unwrap_err();
    assert_eq!(err.cause, Cause::InvalidOperand);
}

#[test]
fn string_constant_lands_in_rodata_with_its_symbol_patched() {
    let bytes = assemble(
        ".section \"rodata\"\n.symbol greeting\ngreeting:\n.object string \"hi\"\n.section \"text\"\n[[entry_point]]\n.symbol main\nmain:\n    arodp $0, @greeting\n    return\n",
    )
    .unwrap();
    assert_eq!(&bytes[0..4], &[0x7F, b'E', b'L', b'F']);
}
