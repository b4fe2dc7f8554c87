//! Raw ELF64 structure definitions and their on-disk byte layout.
//!
//! Field names and sizes mirror `Elf64_Ehdr`/`Elf64_Phdr`/`Elf64_Shdr`/
//! `Elf64_Sym`/`Elf64_Rel` as described in §3/§4.6/§6 of the format this
//! writer targets. Every `write_into` appends its fixed-size encoding to a
//! byte buffer using `byteorder`'s little-endian writers, the same crate
//! `snacchus-vcpu` reaches for when it needs explicit endianness.

use byteorder::{WriteBytesExt, LE};
use std::io;

pub const EI_NIDENT: usize = 16;
pub const ELFCLASS64: u8 = 2;
pub const ELFDATA2LSB: u8 = 1;
pub const EV_CURRENT: u8 = 1;
pub const ELFOSABI_STANDALONE: u8 = 255;

pub const ET_REL: u16 = 1;
pub const ET_EXEC: u16 = 2;
pub const EM_NONE: u16 = 0;

pub const SHT_NULL: u32 = 0;
pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_REL: u32 = 9;

pub const SHF_WRITE: u64 = 1 << 0;
pub const SHF_ALLOC: u64 = 1 << 1;
pub const SHF_EXECINSTR: u64 = 1 << 2;
pub const SHF_STRINGS: u64 = 1 << 5;

pub const PT_LOAD: u32 = 1;
pub const PF_X: u32 = 1 << 0;
pub const PF_W: u32 = 1 << 1;
pub const PF_R: u32 = 1 << 2;

pub const SYM64_SIZE: u64 = 24;
pub const REL64_SIZE: u64 = 16;
pub const EHDR_SIZE: u64 = 64;
pub const PHDR_SIZE: u64 = 56;
pub const SHDR_SIZE: u64 = 64;

pub const STB_LOCAL: u8 = 0;
pub const STB_GLOBAL: u8 = 1;
pub const STT_NOTYPE: u8 = 0;
pub const STT_OBJECT: u8 = 1;
pub const STT_FUNC: u8 = 2;
pub const STV_DEFAULT: u8 = 0;
pub const STV_HIDDEN: u8 = 2;

pub fn st_info(binding: u8, ty: u8) -> u8 {
    (binding << 4) | (ty & 0xF)
}

#[derive(Debug, Clone, Default)]
pub struct Ehdr {
    pub e_type: u16,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_phnum: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl Ehdr {
    pub fn write_into(&self, out: &mut Vec<u8>) -> io::Result<()> {
        let start = out.len();
        out.push(0x7F);
        out.extend_from_slice(b"ELF");
        out.push(ELFCLASS64);
        out.push(ELFDATA2LSB);
        out.push(EV_CURRENT);
        out.push(ELFOSABI_STANDALONE);
        out.resize(start + EI_NIDENT, 0);
        out.write_u16::<LE>(self.e_type)?;
        out.write_u16::<LE>(EM_NONE)?;
        out.write_u32::<LE>(EV_CURRENT as u32)?;
        out.write_u64::<LE>(self.e_entry)?;
        out.write_u64::<LE>(self.e_phoff)?;
        out.write_u64::<LE>(self.e_shoff)?;
        out.write_u32::<LE>(0)?; // e_flags
        out.write_u16::<LE>(EHDR_SIZE as u16)?;
        out.write_u16::<LE>(PHDR_SIZE as u16)?;
        out.write_u16::<LE>(self.e_phnum)?;
        out.write_u16::<LE>(SHDR_SIZE as u16)?;
        out.write_u16::<LE>(self.e_shnum)?;
        out.write_u16::<LE>(self.e_shstrndx)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Phdr {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

impl Phdr {
    pub fn write_into(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u32::<LE>(self.p_type)?;
        out.write_u32::<LE>(self.p_flags)?;
        out.write_u64::<LE>(self.p_offset)?;
        out.write_u64::<LE>(self.p_vaddr)?;
        out.write_u64::<LE>(self.p_paddr)?;
        out.write_u64::<LE>(self.p_filesz)?;
        out.write_u64::<LE>(self.p_memsz)?;
        out.write_u64::<LE>(self.p_align)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Shdr {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

impl Shdr {
    pub fn write_into(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u32::<LE>(self.sh_name)?;
        out.write_u32::<LE>(self.sh_type)?;
        out.write_u64::<LE>(self.sh_flags)?;
        out.write_u64::<LE>(self.sh_addr)?;
        out.write_u64::<LE>(self.sh_offset)?;
        out.write_u64::<LE>(self.sh_size)?;
        out.write_u32::<LE>(self.sh_link)?;
        out.write_u32::<LE>(self.sh_info)?;
        out.write_u64::<LE>(self.sh_addralign)?;
        out.write_u64::<LE>(self.sh_entsize)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sym64 {
    pub st_name: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
    pub st_value: u64,
    pub st_size: u64,
}

impl Sym64 {
    pub fn write_into(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u32::<LE>(self.st_name)?;
        out.push(self.st_info);
        out.push(self.st_other);
        out.write_u16::<LE>(self.st_shndx)?;
        out.write_u64::<LE>(self.st_value)?;
        out.write_u64::<LE>(self.st_size)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Rel64 {
    pub r_offset: u64,
    pub r_info: u64,
}

impl Rel64 {
    pub fn write_into(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u64::<LE>(self.r_offset)?;
        out.write_u64::<LE>(self.r_info)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ehdr_serializes_to_the_fixed_64_byte_header() {
        let ehdr = Ehdr {
            e_type: ET_EXEC,
            e_entry: 0x10,
            e_phoff: EHDR_SIZE,
            e_shoff: 900,
            e_phnum: 3,
            e_shnum: 10,
            e_shstrndx: 9,
        };
        let mut out = Vec::new();
        ehdr.write_into(&mut out).unwrap();
        assert_eq!(out.len(), EHDR_SIZE as usize);
        assert_eq!(&out[0..4], &[0x7F, b'E', b'L', b'F']);
        assert_eq!(out[4], ELFCLASS64);
        assert_eq!(out[7], ELFOSABI_STANDALONE);
    }

    #[test]
    fn sym64_serializes_to_twenty_four_bytes() {
        let sym = Sym64 {
            st_name: 1,
            st_info: st_info(STB_GLOBAL, STT_FUNC),
            st_other: STV_DEFAULT,
            st_shndx: 5,
            st_value: 8,
            st_size: 16,
        };
        let mut out = Vec::new();
        sym.write_into(&mut out).unwrap();
        assert_eq!(out.len(), SYM64_SIZE as usize);
    }
}
