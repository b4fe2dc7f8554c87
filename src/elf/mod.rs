//! # ELF writer
//!
//! Assembles the final object file: ten sections in a fixed order, the
//! `.viua.magic` trick, relocation generation, entry-point enforcement, and
//! extern/definition coherence checking.

pub mod layout;
pub mod reloc;
pub mod strtab;

#[cfg(test)]
mod tests;

use crate::error::{Cause, Error, Span};
use crate::symtab::{SectionId, SymbolTable, SymbolType};
use layout::*;
use strtab::StringTable;

/// The `.viua.magic` constant, embedded in the second program header's
/// `p_offset` field rather than in any section body.
pub const VIUA_MAGIC: u64 = 0x5641_5355_4942_4A4F; // "OJBIUSAV" read little-endian as "VIUA..."

pub struct ObjectInput<'a> {
    pub text: &'a [u64],
    pub rodata: &'a [u8],
    pub symtab: &'a SymbolTable,
}

/// Build the complete ELF64 image. Mutates nothing; callers write the
/// returned bytes to disk.
pub fn write(input: ObjectInput<'_>) -> Result<Vec<u8>, Error> {
    check_extern_coherence(input.symtab)?;
    let entry_symbol = find_entry_point(input.symtab)?;

    let relocations = reloc::scan(input.text);
    let text_bytes = words_to_bytes(input.text);

    let mut shstrtab = StringTable::new();
    let mut strtab = StringTable::new();

    let name_viua_magic = shstrtab.insert(".viua.magic");
    let name_interp = shstrtab.insert(".interp");
    let name_rel = shstrtab.insert(".rel");
    let name_text = shstrtab.insert(".text");
    let name_rodata = shstrtab.insert(".rodata");
    let name_comment = shstrtab.insert(".comment");
    let name_symtab = shstrtab.insert(".symtab");
    let name_strtab = shstrtab.insert(".strtab");
    let name_shstrtab = shstrtab.insert(".shstrtab");

    let interp_body = b"viua-vm\0".to_vec();
    let comment_body = format!("viua-asm {}\0", env!("CARGO_PKG_VERSION")).into_bytes();

    // Section indices, fixed per spec.md 4.6.
    const NULL_NDX: u16 = 0;
    const MAGIC_NDX: u16 = 1;
    const INTERP_NDX: u16 = 2;
    const REL_NDX: u16 = 3;
    const TEXT_NDX: u16 = 4;
    const RODATA_NDX: u16 = 5;
    const COMMENT_NDX: u16 = 6;
    const SYMTAB_NDX: u16 = 7;
    const STRTAB_NDX: u16 = 8;
    const SHSTRTAB_NDX: u16 = 9;
    const SECTION_COUNT: u16 = 10;

    let symtab_body = build_symtab(input.symtab, &mut strtab, TEXT_NDX, RODATA_NDX);
    let rel_body = build_rel(&relocations);
    let strtab_body = strtab.into_bytes();
    let shstrtab_body = shstrtab.into_bytes();

    let include_rel = !relocations.is_empty();

    // Two-pass layout: pass one computes every section's size so file
    // offsets can be assigned by straight accumulation past the header
    // region (ehdr + phdrs + shdrs).
    let phnum: u16 = 3; // .viua.magic, .text, .rodata
    let header_region = EHDR_SIZE + phnum as u64 * PHDR_SIZE + SECTION_COUNT as u64 * SHDR_SIZE;

    let mut offset = header_region;
    let interp_off = offset;
    offset += interp_body.len() as u64;
    let rel_off = offset;
    if include_rel {
        offset += rel_body.len() as u64;
    }
    offset = align_up(offset, 8);
    let text_off = offset;
    offset += text_bytes.len() as u64;
    offset = align_up(offset, 8);
    let rodata_off = offset;
    offset += input.rodata.len() as u64;
    let comment_off = offset;
    offset += comment_body.len() as u64;
    let symtab_off = offset;
    offset += symtab_body.len() as u64;
    let strtab_off = offset;
    offset += strtab_body.len() as u64;
    let shstrtab_off = offset;

    let e_type = if entry_symbol.is_some() { ET_EXEC } else { ET_REL };
    let e_entry = match entry_symbol {
        Some(idx) => text_off + input.symtab.get(idx).value,
        None => 0,
    };

    let phdrs = vec![
        Phdr {
            p_type: PT_LOAD,
            p_flags: 0,
            p_offset: VIUA_MAGIC,
            p_vaddr: 0,
            p_paddr: 0,
            p_filesz: 0,
            p_memsz: 0,
            p_align: 1,
        },
        Phdr {
            p_type: PT_LOAD,
            p_flags: PF_R | PF_X,
            p_offset: text_off,
            p_vaddr: text_off,
            p_paddr: text_off,
            p_filesz: text_bytes.len() as u64,
            p_memsz: text_bytes.len() as u64,
            p_align: 8,
        },
        Phdr {
            p_type: PT_LOAD,
            p_flags: PF_R,
            p_offset: rodata_off,
            p_vaddr: rodata_off,
            p_paddr: rodata_off,
            p_filesz: input.rodata.len() as u64,
            p_memsz: input.rodata.len() as u64,
            p_align: 8,
        },
    ];

    let mut shdrs = vec![Shdr::default(); SECTION_COUNT as usize];
    shdrs[MAGIC_NDX as usize] = Shdr {
        sh_name: name_viua_magic,
        sh_type: SHT_PROGBITS,
        ..Default::default()
    };
    shdrs[INTERP_NDX as usize] = Shdr {
        sh_name: name_interp,
        sh_type: SHT_PROGBITS,
        sh_flags: SHF_ALLOC,
        sh_offset: interp_off,
        sh_size: interp_body.len() as u64,
        sh_addralign: 1,
        ..Default::default()
    };
    shdrs[REL_NDX as usize] = Shdr {
        sh_name: name_rel,
        sh_type: SHT_REL,
        sh_offset: if include_rel { rel_off } else { 0 },
        sh_size: if include_rel { rel_body.len() as u64 } else { 0 },
        sh_link: SYMTAB_NDX as u32,
        sh_info: TEXT_NDX as u32,
        sh_addralign: 8,
        sh_entsize: REL64_SIZE,
        ..Default::default()
    };
    shdrs[TEXT_NDX as usize] = Shdr {
        sh_name: name_text,
        sh_type: SHT_PROGBITS,
        sh_flags: SHF_ALLOC | SHF_EXECINSTR,
        sh_addr: text_off,
        sh_offset: text_off,
        sh_size: text_bytes.len() as u64,
        sh_addralign: 8,
        ..Default::default()
    };
    shdrs[RODATA_NDX as usize] = Shdr {
        sh_name: name_rodata,
        sh_type: SHT_PROGBITS,
        sh_flags: SHF_ALLOC,
        sh_addr: rodata_off,
        sh_offset: rodata_off,
        sh_size: input.rodata.len() as u64,
        sh_addralign: 8,
        ..Default::default()
    };
    shdrs[COMMENT_NDX as usize] = Shdr {
        sh_name: name_comment,
        sh_type: SHT_PROGBITS,
        sh_offset: comment_off,
        sh_size: comment_body.len() as u64,
        sh_addralign: 1,
        ..Default::default()
    };
    shdrs[SYMTAB_NDX as usize] = Shdr {
        sh_name: name_symtab,
        sh_type: SHT_SYMTAB,
        sh_offset: symtab_off,
        sh_size: symtab_body.len() as u64,
        sh_link: STRTAB_NDX as u32,
        sh_addralign: 8,
        sh_entsize: SYM64_SIZE,
        ..Default::default()
    };
    shdrs[STRTAB_NDX as usize] = Shdr {
        sh_name: name_strtab,
        sh_type: SHT_STRTAB,
        sh_flags: SHF_STRINGS,
        sh_offset: strtab_off,
        sh_size: strtab_body.len() as u64,
        sh_addralign: 1,
        ..Default::default()
    };
    shdrs[SHSTRTAB_NDX as usize] = Shdr {
        sh_name: name_shstrtab,
        sh_type: SHT_STRTAB,
        sh_flags: SHF_STRINGS,
        sh_offset: shstrtab_off,
        sh_size: shstrtab_body.len() as u64,
        sh_addralign: 1,
        ..Default::default()
    };
    let _ = NULL_NDX;

    let ehdr = Ehdr {
        e_type,
        e_entry,
        e_phoff: EHDR_SIZE,
        e_shoff: EHDR_SIZE + phnum as u64 * PHDR_SIZE,
        e_phnum: phnum,
        e_shnum: SECTION_COUNT,
        e_shstrndx: SHSTRTAB_NDX,
    };

    let mut out = Vec::with_capacity(shstrtab_off as usize + shstrtab_body.len());
    ehdr.write_into(&mut out).map_err(io_error)?;
    for phdr in &phdrs {
        phdr.write_into(&mut out).map_err(io_error)?;
    }
    for shdr in &shdrs {
        shdr.write_into(&mut out).map_err(io_error)?;
    }
    out.extend_from_slice(&interp_body);
    if include_rel {
        pad_to(&mut out, rel_off);
        out.extend_from_slice(&rel_body);
    }
    pad_to(&mut out, text_off);
    out.extend_from_slice(&text_bytes);
    pad_to(&mut out, rodata_off);
    out.extend_from_slice(input.rodata);
    out.extend_from_slice(&comment_body);
    out.extend_from_slice(&symtab_body);
    out.extend_from_slice(&strtab_body);
    out.extend_from_slice(&shstrtab_body);

    Ok(out)
}

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) / align * align
}

fn pad_to(out: &mut Vec<u8>, target: u64) {
    if (out.len() as u64) < target {
        out.resize(target as usize, 0);
    }
}

fn words_to_bytes(words: &[u64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 8);
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes
}

fn build_symtab(symtab: &SymbolTable, strtab: &mut StringTable, text_ndx: u16, rodata_ndx: u16) -> Vec<u8> {
    let mut out = Vec::new();
    Sym64::default().write_into(&mut out).expect("write into Vec never fails");
    for (_, symbol) in symtab.iter() {
        let st_name = strtab.insert(&symbol.name);
        let ty = match symbol.ty {
            SymbolType::Func => STT_FUNC,
            SymbolType::Object => STT_OBJECT,
            SymbolType::NoType => STT_NOTYPE,
        };
        let binding = match symbol.binding {
            crate::symtab::Binding::Local => STB_LOCAL,
            crate::symtab::Binding::Global => STB_GLOBAL,
        };
        let visibility = match symbol.visibility {
            crate::symtab::Visibility::Default => STV_DEFAULT,
            crate::symtab::Visibility::Hidden => STV_HIDDEN,
        };
        let st_shndx = match symbol.ty {
            SymbolType::Func => text_ndx,
            SymbolType::Object => rodata_ndx,
            SymbolType::NoType => 0,
        };
        let sym = Sym64 {
            st_name,
            st_info: st_info(binding, ty),
            st_other: visibility,
            st_shndx,
            st_value: symbol.value,
            st_size: symbol.size,
        };
        sym.write_into(&mut out).expect("write into Vec never fails");
    }
    out
}

fn build_rel(relocations: &[reloc::Relocation]) -> Vec<u8> {
    let mut out = Vec::new();
    for relocation in relocations {
        let rel = Rel64 {
            r_offset: relocation.offset,
            r_info: relocation.info(),
        };
        rel.write_into(&mut out).expect("write into Vec never fails");
    }
    out
}

fn find_entry_point(symtab: &SymbolTable) -> Result<Option<usize>, Error> {
    let mut found: Option<usize> = None;
    for (idx, symbol) in symtab.iter() {
        if !symbol.is_entry_point {
            continue;
        }
        if let Some(first) = found {
            let first_span = symtab.get(first).declared_at;
            return Err(Error::duplicated_entry_point(symbol.declared_at, first_span));
        }
        if symbol.ty != SymbolType::Func
            || symbol.binding != crate::symtab::Binding::Global
            || symbol.visibility != crate::symtab::Visibility::Default
        {
            return Err(Error::invalid_operand(
                symbol.declared_at,
                "[[entry_point]] must be a global, default-visibility function",
            ));
        }
        found = Some(idx);
    }
    Ok(found)
}

fn check_extern_coherence(symtab: &SymbolTable) -> Result<(), Error> {
    for (_, symbol) in symtab.iter() {
        if symbol.is_extern {
            if symbol.value != 0 || symbol.size != 0 {
                return Err(Error::new(
                    Cause::InvalidOperand,
                    format!("extern symbol `{}` must have a zero value and size", symbol.name),
                    symbol.declared_at,
                )
                .with_note("extern declarations are filled in by the linker, not this assembler"));
            }
        } else if symbol.size == 0 {
            return Err(Error::new(
                Cause::InvalidOperand,
                format!("non-extern symbol `{}` must have a nonzero size", symbol.name),
                symbol.declared_at,
            )
            .with_note("did you forget to give it a body or an .object allocation?"));
        }
    }
    Ok(())
}

fn io_error(err: std::io::Error) -> Error {
    Error::new(Cause::None, format!("internal write error: {err}"), Span::dummy())
}
