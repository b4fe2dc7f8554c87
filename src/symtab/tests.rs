use super::{collect, Binding, SymbolType, Visibility};
use crate::lexer::tokenize;
use crate::parser::parse;

fn collect_source(source: &str) -> super::SymbolTable {
    let lexemes = tokenize(source).expect("lex");
    let nodes = parse(&lexemes).expect("parse");
    collect(&nodes).expect("collect")
}

#[test]
fn function_symbol_defaults_to_global() {
    let table = collect_source(".section \"text\"\n.symbol main\nmain:\n    return\n");
    let idx = table.lookup("main").unwrap();
    let sym = table.get(idx);
    assert_eq!(sym.ty, SymbolType::Func);
    assert_eq!(sym.binding, Binding::Global);
    assert_eq!(sym.visibility, Visibility::Default);
}

#[test]
fn object_symbol_defaults_to_local() {
    let table = collect_source(".section \"rodata\"\n.symbol greeting\n.object string \"hi\"\n");
    let idx = table.lookup("greeting").unwrap();
    let sym = table.get(idx);
    assert_eq!(sym.ty, SymbolType::Object);
    assert_eq!(sym.binding, Binding::Local);
}

#[test]
fn global_default_visibility_object_symbol_is_rejected() {
    let lexemes = tokenize(".section \"rodata\"\n.symbol [[global]] greeting\n").unwrap();
    let nodes = parse(&lexemes).unwrap();
    let err = collect(&nodes).unwrap_err();
    assert!(err.message.contains("globally visible"));
}

#[test]
fn hidden_attribute_overrides_default_visibility() {
    let table = collect_source(".section \"text\"\n.symbol [[hidden]] helper\nhelper:\n    return\n");
    let idx = table.lookup("helper").unwrap();
    assert_eq!(table.get(idx).visibility, Visibility::Hidden);
}

#[test]
fn declaring_local_and_global_together_is_an_error() {
    let lexemes = tokenize(".section \"text\"\n.symbol [[local,global]] f\n").unwrap();
    let nodes = parse(&lexemes).unwrap();
    let err = collect(&nodes).unwrap_err();
    assert!(err.message.contains("local") && err.message.contains("global"));
}

#[test]
fn undeclared_text_label_becomes_hidden_jump_target() {
    let table = collect_source(".section \"text\"\n.symbol main\nmain:\n    loop:\n    return\n");
    let idx = table.lookup("loop").unwrap();
    let sym = table.get(idx);
    assert!(sym.is_jump_label());
}

#[test]
fn declared_function_label_is_callable_not_rebound_as_jump_target() {
    let table =
        collect_source(".section \"text\"\n.symbol main\nmain:\n    return\n.symbol helper\nhelper:\n    return\n");
    let idx = table.lookup("helper").unwrap();
    assert!(table.get(idx).is_callable_label());
}

#[test]
fn symbol_declared_outside_any_section_is_an_error() {
    let lexemes = tokenize(".symbol main\n").unwrap();
    let nodes = parse(&lexemes).unwrap();
    let err = collect(&nodes).unwrap_err();
    assert!(err.note.unwrap().contains(".text"));
}
