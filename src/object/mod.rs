//! # Object materializer
//!
//! Second AST walk: fills in `.rodata` and, for instructions whose final
//! operand is too large to fit in the instruction word, creates anonymous
//! symbols and rewrites that operand to a symbol-index reference.

pub mod ctor;

#[cfg(test)]
mod tests;

use crate::error::Error;
use crate::parser::ast::{Node, OperandKind, Payload};
use crate::symtab::{Binding, SectionId, Symbol, SymbolTable, SymbolType, Visibility};

/// `.rodata` reserves its first 8 bytes as zero, so offset 0 can double as
/// a sentinel "no address" value.
pub const RESERVED_PREFIX: usize = 8;

pub fn materialize(nodes: &mut [Node], symtab: &mut SymbolTable) -> Result<Vec<u8>, Error> {
    let mut rodata = vec![0u8; RESERVED_PREFIX];
    let mut active = SectionId::None;
    let mut active_label: Option<usize> = None;

    for node in nodes.iter_mut() {
        match &node.payload {
            Payload::Section { name } => {
                let normalized = name.trim_start_matches('.');
                active = match normalized {
                    "text" => SectionId::Text,
                    "rodata" => SectionId::Rodata,
                    _ => active,
                };
                active_label = None;
                continue;
            }
            _ => {}
        }

        match active {
            SectionId::Rodata => match &node.payload {
                Payload::Label { name } => {
                    let idx = symtab.lookup(name).ok_or_else(|| {
                        Error::unknown_label(node.span(), name, &symtab.known_names())
                    })?;
                    symtab.get_mut(idx).value = rodata.len() as u64;
                    active_label = Some(idx);
                }
                Payload::Object { ty, ctor } => {
                    let idx = active_label.ok_or_else(|| {
                        Error::invalid_operand(
                            node.span(),
                            "an object allocation must follow a label",
                        )
                    })?;
                    if symtab.get(idx).ty != SymbolType::Object {
                        return Err(Error::invalid_operand(
                            node.span(),
                            "this label is already bound to a non-object symbol",
                        )
                        .with_extra(symtab.get(idx).declared_at));
                    }
                    let bytes = match ty.as_str() {
                        "string" => ctor::evaluate(ctor)?,
                        other => {
                            return Err(Error::invalid_operand(
                                node.span(),
                                format!("unknown object type `{other}`, expected `string`"),
                            ))
                        }
                    };
                    symtab.get_mut(idx).size = bytes.len() as u64;
                    rodata.extend_from_slice(&bytes);
                }
                _ => {}
            },
            SectionId::Text => {
                if let Payload::Instruction {
                    mnemonic, operands, ..
                } = &mut node.payload
                {
                    materialize_instruction_operand(mnemonic, operands, symtab, &mut rodata)?;
                }
            }
            SectionId::None => {}
        }
    }

    Ok(rodata)
}

fn materialize_instruction_operand(
    mnemonic: &str,
    operands: &mut [crate::parser::ast::Operand],
    symtab: &mut SymbolTable,
    rodata: &mut Vec<u8>,
) -> Result<(), Error> {
    if !matches!(mnemonic, "atom" | "arodp" | "double") {
        return Ok(());
    }
    let Some(last) = operands.last_mut() else {
        return Ok(());
    };
    let span = last.span;

    let new_kind = match (&last.kind, mnemonic) {
        (OperandKind::Label(name), _) => {
            let idx = symtab
                .lookup(name)
                .ok_or_else(|| Error::unknown_label(span, name, &symtab.known_names()))?;
            Some(idx as u32)
        }
        (OperandKind::Str(s), "atom") => Some(anonymous_data_symbol(symtab, rodata, s.as_bytes(), span)),
        (OperandKind::Atom(name), "atom") => {
            Some(anonymous_data_symbol(symtab, rodata, name.as_bytes(), span))
        }
        (OperandKind::Float(value), "double") => {
            let bytes = value.to_le_bytes();
            Some(anonymous_data_symbol(symtab, rodata, &bytes, span))
        }
        _ => None,
    };

    if let Some(idx) = new_kind {
        last.kind = OperandKind::SymbolIndex(idx);
    }
    Ok(())
}

fn anonymous_data_symbol(
    symtab: &mut SymbolTable,
    rodata: &mut Vec<u8>,
    bytes: &[u8],
    span: crate::error::Span,
) -> u32 {
    let value = rodata.len() as u64;
    rodata.extend_from_slice(bytes);
    let idx = symtab.push(Symbol {
        name: String::new(),
        ty: SymbolType::Object,
        binding: Binding::Local,
        visibility: Visibility::Hidden,
        section: SectionId::Rodata,
        value,
        size: bytes.len() as u64,
        is_extern: false,
        is_entry_point: false,
        declared_at: span,
    });
    idx as u32
}
