//! # viua-asm
//!
//! Assembler and ELF64 linker core for the Viua VM bytecode format.
//!
//! Six stages, each returning `Result<_, Error>` and aborting the whole
//! pipeline on its first failure (`spec.md` §7, §5): lexer, parser, symbol
//! collector, object materializer, instruction cooker, ELF writer.

pub mod cook;
pub mod elf;
pub mod error;
pub mod isa;
pub mod lexer;
pub mod mnemonic;
pub mod object;
pub mod parser;
pub mod suggest;
pub mod symtab;

use error::Error;

/// Run every stage over `source` and return the finished ELF64 image.
#[tracing::instrument(skip(source))]
pub fn assemble(source: &str) -> Result<Vec<u8>, Error> {
    let lexemes = tracing::info_span!("lex").in_scope(|| lexer::tokenize(source))?;
    let mut nodes = tracing::info_span!("parse").in_scope(|| parser::parse(&lexemes))?;
    let mut symtab = tracing::info_span!("collect_symbols").in_scope(|| symtab::collect(&nodes))?;
    let rodata = tracing::info_span!("materialize_objects")
        .in_scope(|| object::materialize(&mut nodes, &mut symtab))?;
    let text = tracing::info_span!("cook_instructions").in_scope(|| cook::cook(&nodes, &mut symtab))?;
    tracing::info_span!("write_elf").in_scope(|| {
        elf::write(elf::ObjectInput {
            text: &text,
            rodata: &rodata,
            symtab: &symtab,
        })
    })
}
