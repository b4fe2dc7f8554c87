//! # Instruction cooker
//!
//! Third `.text` walk: expands pseudo-instructions and encodes every real
//! instruction into a 64-bit word, growing the text buffer and patching
//! each function symbol's `st_value`/`st_size` as labels are crossed.

pub mod pseudo;

#[cfg(test)]
mod tests;

use crate::error::Error;
use crate::isa::{Encoded, Opcode};
use crate::parser::ast::{Node, Payload};
use crate::symtab::{SectionId, SymbolTable};

const BYTES_PER_WORD: u64 = 8;

pub fn cook(nodes: &[Node], symtab: &mut SymbolTable) -> Result<Vec<u64>, Error> {
    let mut words: Vec<u64> = vec![Encoded::N { op: Opcode::Halt, greedy: false }.pack()];
    let mut active_function: Option<usize> = None;
    let mut section = SectionId::None;

    for node in nodes {
        if let Payload::Section { name } = &node.payload {
            let normalized = name.trim_start_matches('.');
            section = match normalized {
                "text" => SectionId::Text,
                "rodata" => SectionId::Rodata,
                _ => section,
            };
            continue;
        }

        if section != SectionId::Text {
            continue;
        }

        match &node.payload {
            Payload::Label { name } => {
                let idx = symtab
                    .lookup(name)
                    .ok_or_else(|| Error::unknown_label(node.span(), name, &symtab.known_names()))?;
                close_function(symtab, active_function, words.len() as u64 * BYTES_PER_WORD);
                symtab.get_mut(idx).value = words.len() as u64 * BYTES_PER_WORD;
                active_function = Some(idx);
            }
            Payload::Instruction { mnemonic, greedy, operands } => {
                let force_full = node.has_attr("full");
                let encoded = pseudo::expand(mnemonic, *greedy, force_full, operands, node.span(), symtab)?;
                words.extend(encoded.into_iter().map(Encoded::pack));
            }
            _ => {}
        }
    }

    close_function(symtab, active_function, words.len() as u64 * BYTES_PER_WORD);
    words.push(Encoded::N { op: Opcode::Halt, greedy: false }.pack());

    Ok(words)
}

fn close_function(symtab: &mut SymbolTable, function: Option<usize>, offset: u64) {
    if let Some(idx) = function {
        let value = symtab.get(idx).value;
        symtab.get_mut(idx).size = offset - value;
    }
}
