//! Pseudo-instruction expansion: each source-level mnemonic becomes zero or
//! more [`Encoded`] words. Real opcodes with no special syntax pass straight
//! through to the generic per-format encoder at the bottom of this module.

use crate::error::{Error, Span};
use crate::isa::{Encoded, Format, Opcode, RegisterAccess, Unit, E_IMMEDIATE_MAX, SCRATCH_REGISTER};
use crate::mnemonic;
use crate::parser::ast::{Operand, OperandKind};
use crate::symtab::SymbolTable;

pub fn expand(
    mnemonic_name: &str,
    greedy: bool,
    force_full: bool,
    operands: &[Operand],
    span: Span,
    symtab: &SymbolTable,
) -> Result<Vec<Encoded>, Error> {
    match mnemonic_name {
        "li" => expand_li(greedy, force_full, operands, span),
        "delete" => expand_delete(operands, span),
        "return" => expand_return(operands, span),
        "if" => expand_if(operands, span, symtab),
        "call" | "actor" => expand_call_actor(mnemonic_name, operands, span, symtab),
        "atom" => expand_materialized(Opcode::Atom, greedy, operands, span),
        "double" => expand_materialized(Opcode::Double, greedy, operands, span),
        "cast" => expand_cast(greedy, operands, span),
        _ => {
            if let Some((store_like, is_alloc, unit_letter)) = mnemonic::memory_mnemonic(mnemonic_name) {
                expand_memory(greedy, store_like, is_alloc, unit_letter, operands, span)
            } else if let Some((root, mnemonic_unsigned)) =
                mnemonic::immediate_arithmetic_mnemonic(mnemonic_name)
            {
                expand_immediate_arithmetic(root, greedy, mnemonic_unsigned, operands, span)
            } else {
                expand_passthrough(mnemonic_name, greedy, operands, span)
            }
        }
    }
}

fn register_access(kind: &OperandKind, span: Span) -> Result<RegisterAccess, Error> {
    match kind {
        OperandKind::Void => Ok(RegisterAccess::void()),
        OperandKind::Register { direct, set, index } => Ok(RegisterAccess {
            direct: *direct,
            set: *set,
            index: *index,
        }),
        _ => Err(Error::invalid_operand(span, "expected a register or `void`")),
    }
}

fn expect_operands(operands: &[Operand], expected: usize, span: Span) -> Result<(), Error> {
    if operands.len() != expected {
        return Err(Error::too_few_operands(
            span,
            format!("expected {expected} operand(s), found {}", operands.len()),
        ));
    }
    Ok(())
}

fn split_64(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, (value & 0xFFFF_FFFF) as u32)
}

fn fits_in_r_immediate(value: i64, unsigned: bool) -> bool {
    if unsigned {
        value == -1 || (0..=0xFF_FFFF).contains(&value)
    } else {
        (-0x80_0000..=0x7F_FFFF).contains(&value)
    }
}

fn validate_r_immediate(value: i64, unsigned: bool, span: Span) -> Result<(), Error> {
    if unsigned && value < 0 && value != -1 {
        return Err(Error::value_out_of_range(
            span,
            "an unsigned immediate cannot be negative (the only exception is the `-1u` sentinel)",
        ));
    }
    if !fits_in_r_immediate(value, unsigned) {
        return Err(Error::value_out_of_range(span, "immediate does not fit in 24 bits"));
    }
    Ok(())
}

fn expand_li(
    greedy: bool,
    force_full: bool,
    operands: &[Operand],
    span: Span,
) -> Result<Vec<Encoded>, Error> {
    expect_operands(operands, 2, span)?;
    let dest = register_access(&operands[0].kind, operands[0].span)?;
    let (value, unsigned) = match &operands[1].kind {
        OperandKind::Integer { value, unsigned } => (*value, *unsigned),
        _ => {
            return Err(Error::invalid_operand(
                operands[1].span,
                "`li` requires an integer immediate",
            ))
        }
    };

    if unsigned && value < 0 && value != -1 {
        return Err(Error::value_out_of_range(
            operands[1].span,
            "an unsigned immediate cannot be negative (the only exception is the `-1u` sentinel)",
        ));
    }

    if !force_full && fits_in_r_immediate(value, unsigned) {
        return Ok(vec![Encoded::R {
            op: Opcode::Addi,
            greedy,
            unsigned,
            a: dest,
            b: RegisterAccess::void(),
            imm: value as i32,
        }]);
    }

    let target = match &operands[0].kind {
        OperandKind::Void => RegisterAccess::local(SCRATCH_REGISTER),
        _ => dest,
    };
    let (hi, lo) = split_64(value as u64);
    Ok(vec![
        Encoded::F { op: Opcode::Lui, greedy, a: target, imm: hi },
        Encoded::F { op: Opcode::Lli, greedy, a: target, imm: lo },
    ])
}

fn expand_delete(operands: &[Operand], span: Span) -> Result<Vec<Encoded>, Error> {
    expect_operands(operands, 1, span)?;
    let src = register_access(&operands[0].kind, operands[0].span)?;
    Ok(vec![Encoded::D {
        op: Opcode::Move,
        greedy: false,
        a: RegisterAccess::void(),
        b: src,
    }])
}

fn expand_return(operands: &[Operand], span: Span) -> Result<Vec<Encoded>, Error> {
    if operands.len() > 1 {
        return Err(Error::too_few_operands(span, "`return` takes at most one operand"));
    }
    if let Some(operand) = operands.first() {
        register_access(&operand.kind, operand.span)?;
    }
    Ok(vec![Encoded::N { op: Opcode::Return, greedy: false }])
}

/// Which instruction is resolving a label, so an unresolved lookup can
/// raise the cause `spec.md` §7 assigns to that instruction rather than
/// the generic `unknown_label` (reserved for `atom`/`arodp`/`double`).
enum LabelContext {
    Jump,
    Call,
}

fn resolve_label(
    name: &str,
    span: Span,
    symtab: &SymbolTable,
    context: LabelContext,
) -> Result<usize, Error> {
    symtab.lookup(name).ok_or_else(|| match context {
        LabelContext::Jump => Error::jump_to_undefined_label(span, name, &symtab.known_names()),
        LabelContext::Call => Error::call_to_undefined_function(span, name, &symtab.known_names()),
    })
}

fn expand_if(operands: &[Operand], span: Span, symtab: &SymbolTable) -> Result<Vec<Encoded>, Error> {
    expect_operands(operands, 2, span)?;
    let cond = register_access(&operands[0].kind, operands[0].span)?;
    let label_name = match &operands[1].kind {
        OperandKind::Label(name) => name.clone(),
        _ => return Err(Error::invalid_operand(operands[1].span, "`if` requires a label operand")),
    };
    let idx = resolve_label(&label_name, operands[1].span, symtab, LabelContext::Jump)?;
    let sym = symtab.get(idx);
    if !sym.is_jump_label() {
        return Err(Error::invalid_reference(
            operands[1].span,
            format!("`{label_name}` is a callable function, not a jump target"),
        )
        .with_extra(sym.declared_at));
    }
    let (hi, lo) = split_64(idx as u64);
    Ok(vec![
        Encoded::F { op: Opcode::Lui, greedy: true, a: RegisterAccess::local(SCRATCH_REGISTER), imm: hi },
        Encoded::F { op: Opcode::Lli, greedy: true, a: RegisterAccess::local(SCRATCH_REGISTER), imm: lo },
        Encoded::D { op: Opcode::If, greedy: false, a: cond, b: RegisterAccess::local(SCRATCH_REGISTER) },
    ])
}

fn expand_call_actor(
    name: &str,
    operands: &[Operand],
    span: Span,
    symtab: &SymbolTable,
) -> Result<Vec<Encoded>, Error> {
    expect_operands(operands, 2, span)?;
    let ret_access = register_access(&operands[0].kind, operands[0].span)?;
    let label_name = match &operands[1].kind {
        OperandKind::Label(n) => n.clone(),
        _ => return Err(Error::invalid_operand(operands[1].span, format!("`{name}` requires a label operand"))),
    };
    let idx = resolve_label(&label_name, operands[1].span, symtab, LabelContext::Call)?;
    let sym = symtab.get(idx);
    if !sym.is_callable_label() {
        return Err(Error::invalid_reference(
            operands[1].span,
            format!("`{label_name}` is a jump target, not a callable function"),
        )
        .with_extra(sym.declared_at));
    }
    let scratch = if matches!(operands[0].kind, OperandKind::Void) {
        RegisterAccess::local(SCRATCH_REGISTER)
    } else {
        ret_access
    };
    let op = if name == "call" { Opcode::Call } else { Opcode::Actor };
    let (hi, lo) = split_64(idx as u64);
    Ok(vec![
        Encoded::F { op: Opcode::Lui, greedy: true, a: scratch, imm: hi },
        Encoded::F { op: Opcode::Lli, greedy: true, a: scratch, imm: lo },
        Encoded::D { op, greedy: false, a: ret_access, b: scratch },
    ])
}

fn expand_materialized(
    op: Opcode,
    greedy: bool,
    operands: &[Operand],
    span: Span,
) -> Result<Vec<Encoded>, Error> {
    expect_operands(operands, 2, span)?;
    let dest = register_access(&operands[0].kind, operands[0].span)?;
    let idx = match &operands[1].kind {
        OperandKind::SymbolIndex(i) => *i as u64,
        _ => {
            return Err(Error::invalid_operand(
                operands[1].span,
                "expected a materialized string, atom, float literal, or label operand",
            ))
        }
    };
    let (hi, lo) = split_64(idx);
    Ok(vec![
        Encoded::F { op: Opcode::Lui, greedy: true, a: dest, imm: hi },
        Encoded::F { op: Opcode::Lli, greedy: true, a: dest, imm: lo },
        Encoded::N { op, greedy },
    ])
}

fn expand_cast(greedy: bool, operands: &[Operand], span: Span) -> Result<Vec<Encoded>, Error> {
    expect_operands(operands, 2, span)?;
    let dest = register_access(&operands[0].kind, operands[0].span)?;
    let type_name = match &operands[1].kind {
        OperandKind::Type(name) | OperandKind::Atom(name) => name.clone(),
        _ => {
            return Err(Error::invalid_cast(
                operands[1].span,
                "",
                mnemonic::FUNDAMENTAL_TYPES,
            ))
        }
    };
    let code = mnemonic::FUNDAMENTAL_TYPES
        .iter()
        .position(|t| *t == type_name)
        .ok_or_else(|| Error::invalid_cast(operands[1].span, &type_name, mnemonic::FUNDAMENTAL_TYPES))?;
    Ok(vec![Encoded::F { op: Opcode::Cast, greedy, a: dest, imm: code as u32 }])
}

fn expand_memory(
    greedy: bool,
    store_like: bool,
    is_alloc: bool,
    unit_letter: char,
    operands: &[Operand],
    span: Span,
) -> Result<Vec<Encoded>, Error> {
    expect_operands(operands, 3, span)?;
    let unit = Unit::from_mnemonic(unit_letter).expect("validated by mnemonic::memory_mnemonic");
    let a = register_access(&operands[0].kind, operands[0].span)?;
    let b = register_access(&operands[1].kind, operands[1].span)?;
    let offset = match &operands[2].kind {
        OperandKind::Integer { value, .. } => {
            if *value < i16::MIN as i64 || *value > i16::MAX as i64 {
                return Err(Error::value_out_of_range(
                    operands[2].span,
                    "memory offset does not fit in 16 bits",
                ));
            }
            *value as i16
        }
        _ => return Err(Error::invalid_operand(operands[2].span, "expected an integer offset")),
    };
    let op = match (is_alloc, store_like) {
        (false, true) => Opcode::Store,
        (false, false) => Opcode::Load,
        (true, true) => Opcode::StoreAlloc,
        (true, false) => Opcode::LoadAlloc,
    };
    Ok(vec![Encoded::M { op, greedy, unit, a, b, offset }])
}

fn expand_immediate_arithmetic(
    root: &str,
    greedy: bool,
    mnemonic_unsigned: bool,
    operands: &[Operand],
    span: Span,
) -> Result<Vec<Encoded>, Error> {
    expect_operands(operands, 3, span)?;
    let a = register_access(&operands[0].kind, operands[0].span)?;
    let b = register_access(&operands[1].kind, operands[1].span)?;
    let (value, literal_unsigned) = match &operands[2].kind {
        OperandKind::Integer { value, unsigned } => (*value, *unsigned),
        _ => return Err(Error::invalid_operand(operands[2].span, "expected an integer immediate")),
    };
    let unsigned = mnemonic_unsigned || literal_unsigned;
    validate_r_immediate(value, unsigned, operands[2].span)?;
    let op = match root {
        "addi" => Opcode::Addi,
        "subi" => Opcode::Subi,
        "muli" => Opcode::Muli,
        "divi" => Opcode::Divi,
        _ => unreachable!("immediate_arithmetic_mnemonic only returns these roots"),
    };
    Ok(vec![Encoded::R { op, greedy, unsigned, a, b, imm: value as i32 }])
}

fn opcode_table(name: &str) -> Option<Opcode> {
    Some(match name {
        "nop" => Opcode::Nop,
        "halt" => Opcode::Halt,
        "add" => Opcode::Add,
        "and" => Opcode::And,
        "or" => Opcode::Or,
        "move" => Opcode::Move,
        "copy" => Opcode::Copy,
        "swap" => Opcode::Swap,
        "isnull" => Opcode::IsNull,
        "ref" => Opcode::Ref,
        "print" => Opcode::Print,
        "echo" => Opcode::Echo,
        "not" => Opcode::Not,
        "bool" => Opcode::Bool,
        "lui" => Opcode::Lui,
        "lli" => Opcode::Lli,
        "float" => Opcode::Float,
        "arodp" => Opcode::Arodp,
        _ => return None,
    })
}

fn expand_passthrough(name: &str, greedy: bool, operands: &[Operand], span: Span) -> Result<Vec<Encoded>, Error> {
    let op = opcode_table(name).ok_or_else(|| Error::unknown_opcode(span, name, &mnemonic::all_known_mnemonics()))?;
    match op.format() {
        Format::N => Ok(vec![Encoded::N { op, greedy }]),
        Format::T => {
            expect_operands(operands, 3, span)?;
            Ok(vec![Encoded::T {
                op,
                greedy,
                a: register_access(&operands[0].kind, operands[0].span)?,
                b: register_access(&operands[1].kind, operands[1].span)?,
                c: register_access(&operands[2].kind, operands[2].span)?,
            }])
        }
        Format::D => {
            expect_operands(operands, 2, span)?;
            Ok(vec![Encoded::D {
                op,
                greedy,
                a: register_access(&operands[0].kind, operands[0].span)?,
                b: register_access(&operands[1].kind, operands[1].span)?,
            }])
        }
        Format::S => {
            expect_operands(operands, 1, span)?;
            Ok(vec![Encoded::S { op, greedy, a: register_access(&operands[0].kind, operands[0].span)? }])
        }
        Format::F => {
            expect_operands(operands, 2, span)?;
            let a = register_access(&operands[0].kind, operands[0].span)?;
            let imm = match &operands[1].kind {
                OperandKind::Float(v) if op == Opcode::Float => (*v as f32).to_bits(),
                OperandKind::Integer { value, .. } => *value as u32,
                OperandKind::SymbolIndex(i) => *i,
                _ => return Err(Error::invalid_operand(operands[1].span, "expected a numeric immediate")),
            };
            Ok(vec![Encoded::F { op, greedy, a, imm }])
        }
        Format::E => {
            expect_operands(operands, 2, span)?;
            let a = register_access(&operands[0].kind, operands[0].span)?;
            let imm = match &operands[1].kind {
                OperandKind::SymbolIndex(i) => *i as u64,
                OperandKind::Integer { value, .. } => *value as u64,
                _ => {
                    return Err(Error::invalid_operand(
                        operands[1].span,
                        "expected a symbol reference or integer immediate",
                    ))
                }
            };
            if imm > E_IMMEDIATE_MAX {
                return Err(Error::value_out_of_range(operands[1].span, "immediate does not fit in 45 bits"));
            }
            Ok(vec![Encoded::E { op, greedy, a, imm }])
        }
        Format::R | Format::M => unreachable!("R and M format opcodes are handled by dedicated expansion"),
    }
}
