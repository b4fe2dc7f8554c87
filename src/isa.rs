//! # Instruction Set Architecture
//!
//! The single source of truth for how a Viua instruction word is laid out in
//! bits. Every other stage that touches encoded instructions (the cooker's
//! encoder, the ELF writer's relocation scanner) goes through this module
//! rather than re-deriving bit positions locally.
//!
//! ## Instruction word
//!
//! A 64-bit word. The low byte is the opcode: bits `4..8` are the format tag,
//! bit `3` is the greedy flag (`g.` prefix), and bits `0..3` are a
//! format-specific discriminant selecting which concrete opcode this is
//! within its format — except for R-format, where bit `2` is instead an
//! `UNSIGNED` flag and only bits `0..2` select the base arithmetic op.
//!
//! The remaining 56 bits hold the format's operands, packed starting at bit
//! 8, in the order the format lists them.

use crate::error::{Error, Span};

/// One of the eight instruction word shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    N,
    T,
    D,
    S,
    F,
    E,
    R,
    M,
}

impl Format {
    pub fn tag(self) -> u8 {
        match self {
            Format::N => 0,
            Format::T => 1,
            Format::D => 2,
            Format::S => 3,
            Format::F => 4,
            Format::E => 5,
            Format::R => 6,
            Format::M => 7,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Format> {
        Some(match tag {
            0 => Format::N,
            1 => Format::T,
            2 => Format::D,
            3 => Format::S,
            4 => Format::F,
            5 => Format::E,
            6 => Format::R,
            7 => Format::M,
            _ => return None,
        })
    }
}

/// The register set an access refers to, decoded from the two `set` bits.
///
/// `Void` is the fourth value; it lets register-access encoding carry the
/// `void` operand directly instead of modelling it as a separate ingredient
/// kind at the instruction-word level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterSet {
    Local,
    Argument,
    Parameter,
    Void,
}

impl RegisterSet {
    fn bits(self) -> u32 {
        match self {
            RegisterSet::Local => 0,
            RegisterSet::Argument => 1,
            RegisterSet::Parameter => 2,
            RegisterSet::Void => 3,
        }
    }

    fn from_bits(bits: u32) -> RegisterSet {
        match bits & 0b11 {
            0 => RegisterSet::Local,
            1 => RegisterSet::Argument,
            2 => RegisterSet::Parameter,
            _ => RegisterSet::Void,
        }
    }
}

/// A decoded register access: `direct:1 | set:2 | index:8` (11 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterAccess {
    pub direct: bool,
    pub set: RegisterSet,
    pub index: u8,
}

/// Register 253, the scratch register used by forced-long-form `li` and by
/// `if`/`call`/`actor` when the user operand is `void`.
pub const SCRATCH_REGISTER: u8 = 253;

impl RegisterAccess {
    pub const WIDTH: u32 = 11;

    pub fn void() -> RegisterAccess {
        RegisterAccess {
            direct: true,
            set: RegisterSet::Void,
            index: 0,
        }
    }

    pub fn local(index: u8) -> RegisterAccess {
        RegisterAccess {
            direct: true,
            set: RegisterSet::Local,
            index,
        }
    }

    fn pack(self) -> u64 {
        let mut bits = self.index as u64;
        bits |= (self.set.bits() as u64) << 8;
        bits |= (self.direct as u64) << 10;
        bits
    }

    fn unpack(bits: u64) -> RegisterAccess {
        RegisterAccess {
            direct: (bits >> 10) & 1 == 1,
            set: RegisterSet::from_bits(((bits >> 8) & 0b11) as u32),
            index: (bits & 0xFF) as u8,
        }
    }
}

/// Every concrete opcode this core knows how to encode, grouped by format.
///
/// `spec.md` deliberately leaves the full opcode set open ("all other
/// opcodes pass through unchanged to the encoder"); this table fixes one
/// concrete, internally consistent set wide enough to exercise every
/// pseudo-instruction and every instruction-word format the specification
/// names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    // N — opcode only
    Nop,
    Halt,
    Return,
    Atom,
    Double,

    // T — three register accesses
    Add,
    And,
    Or,

    // D — two register accesses
    Move,
    Copy,
    Swap,
    IsNull,
    Ref,
    If,
    Call,
    Actor,

    // S — one register access
    Print,
    Echo,
    Not,
    Bool,

    // F — one register access + 32-bit immediate
    Lui,
    Lli,
    Float,
    Cast,

    // E — one register access + 45-bit immediate
    Arodp,

    // R — two register accesses + 24-bit immediate
    Addi,
    Subi,
    Muli,
    Divi,

    // M — unit + two register accesses + 16-bit offset
    Store,
    Load,
    StoreAlloc,
    LoadAlloc,
}

impl Opcode {
    pub fn format(self) -> Format {
        use Opcode::*;
        match self {
            Nop | Halt | Return | Atom | Double => Format::N,
            Add | And | Or => Format::T,
            Move | Copy | Swap | IsNull | Ref | If | Call | Actor => Format::D,
            Print | Echo | Not | Bool => Format::S,
            Lui | Lli | Float | Cast => Format::F,
            Arodp => Format::E,
            Addi | Subi | Muli | Divi => Format::R,
            Store | Load | StoreAlloc | LoadAlloc => Format::M,
        }
    }

    /// Whether this R-format opcode interprets its 24-bit immediate as
    /// unsigned. Panics is avoided by returning `false` for non-R opcodes;
    /// callers only consult this for `Format::R` instructions.
    pub fn is_r_format(self) -> bool {
        matches!(self, Opcode::Addi | Opcode::Subi | Opcode::Muli | Opcode::Divi)
    }

    fn discriminant(self) -> u8 {
        use Opcode::*;
        match self {
            Nop => 0,
            Halt => 1,
            Return => 2,
            Atom => 3,
            Double => 4,

            Add => 0,
            And => 1,
            Or => 2,

            Move => 0,
            Copy => 1,
            Swap => 2,
            IsNull => 3,
            Ref => 4,
            If => 5,
            Call => 6,
            Actor => 7,

            Print => 0,
            Echo => 1,
            Not => 2,
            Bool => 3,

            Lui => 0,
            Lli => 1,
            Float => 2,
            Cast => 3,

            Arodp => 0,

            Addi => 0,
            Subi => 1,
            Muli => 2,
            Divi => 3,

            Store => 0,
            Load => 1,
            StoreAlloc => 2,
            LoadAlloc => 3,
        }
    }

    /// Encode the opcode byte given a greedy flag and, for R-format
    /// opcodes, whether the immediate is unsigned.
    pub fn to_byte(self, greedy: bool, unsigned: bool) -> u8 {
        let tag = self.format().tag() << 4;
        let greedy_bit = (greedy as u8) << 3;
        if self.is_r_format() {
            let unsigned_bit = (unsigned as u8) << 2;
            tag | greedy_bit | unsigned_bit | self.discriminant()
        } else {
            tag | greedy_bit | self.discriminant()
        }
    }

    pub fn from_byte(byte: u8) -> Option<(Opcode, bool, bool)> {
        let tag = (byte >> 4) & 0xF;
        let format = Format::from_tag(tag)?;
        let greedy = (byte >> 3) & 1 == 1;
        match format {
            Format::N => {
                let op = match byte & 0b111 {
                    0 => Opcode::Nop,
                    1 => Opcode::Halt,
                    2 => Opcode::Return,
                    3 => Opcode::Atom,
                    4 => Opcode::Double,
                    _ => return None,
                };
                Some((op, greedy, false))
            }
            Format::T => {
                let op = match byte & 0b111 {
                    0 => Opcode::Add,
                    1 => Opcode::And,
                    2 => Opcode::Or,
                    _ => return None,
                };
                Some((op, greedy, false))
            }
            Format::D => {
                let op = match byte & 0b111 {
                    0 => Opcode::Move,
                    1 => Opcode::Copy,
                    2 => Opcode::Swap,
                    3 => Opcode::IsNull,
                    4 => Opcode::Ref,
                    5 => Opcode::If,
                    6 => Opcode::Call,
                    7 => Opcode::Actor,
                    _ => return None,
                };
                Some((op, greedy, false))
            }
            Format::S => {
                let op = match byte & 0b111 {
                    0 => Opcode::Print,
                    1 => Opcode::Echo,
                    2 => Opcode::Not,
                    3 => Opcode::Bool,
                    _ => return None,
                };
                Some((op, greedy, false))
            }
            Format::F => {
                let op = match byte & 0b111 {
                    0 => Opcode::Lui,
                    1 => Opcode::Lli,
                    2 => Opcode::Float,
                    3 => Opcode::Cast,
                    _ => return None,
                };
                Some((op, greedy, false))
            }
            Format::E => {
                let op = match byte & 0b111 {
                    0 => Opcode::Arodp,
                    _ => return None,
                };
                Some((op, greedy, false))
            }
            Format::R => {
                let unsigned = (byte >> 2) & 1 == 1;
                let op = match byte & 0b11 {
                    0 => Opcode::Addi,
                    1 => Opcode::Subi,
                    2 => Opcode::Muli,
                    3 => Opcode::Divi,
                    _ => return None,
                };
                Some((op, greedy, unsigned))
            }
            Format::M => {
                let op = match byte & 0b111 {
                    0 => Opcode::Store,
                    1 => Opcode::Load,
                    2 => Opcode::StoreAlloc,
                    3 => Opcode::LoadAlloc,
                    _ => return None,
                };
                Some((op, greedy, false))
            }
        }
    }
}

/// Memory access unit width, the first operand of a cooked `M`-format
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Byte,
    Half,
    Word,
    Double,
    Quad,
}

impl Unit {
    pub fn bits(self) -> u64 {
        match self {
            Unit::Byte => 0,
            Unit::Half => 1,
            Unit::Word => 2,
            Unit::Double => 3,
            Unit::Quad => 4,
        }
    }

    pub fn from_mnemonic(letter: char) -> Option<Unit> {
        Some(match letter {
            'b' => Unit::Byte,
            'h' => Unit::Half,
            'w' => Unit::Word,
            'd' => Unit::Double,
            'q' => Unit::Quad,
            _ => return None,
        })
    }
}

/// A fully encoded instruction: everything needed to pack it into a 64-bit
/// word, in format-appropriate variants.
#[derive(Debug, Clone, Copy)]
pub enum Encoded {
    N {
        op: Opcode,
        greedy: bool,
    },
    T {
        op: Opcode,
        greedy: bool,
        a: RegisterAccess,
        b: RegisterAccess,
        c: RegisterAccess,
    },
    D {
        op: Opcode,
        greedy: bool,
        a: RegisterAccess,
        b: RegisterAccess,
    },
    S {
        op: Opcode,
        greedy: bool,
        a: RegisterAccess,
    },
    F {
        op: Opcode,
        greedy: bool,
        a: RegisterAccess,
        imm: u32,
    },
    E {
        op: Opcode,
        greedy: bool,
        a: RegisterAccess,
        imm: u64,
    },
    R {
        op: Opcode,
        greedy: bool,
        unsigned: bool,
        a: RegisterAccess,
        b: RegisterAccess,
        imm: i32,
    },
    M {
        op: Opcode,
        greedy: bool,
        unit: Unit,
        a: RegisterAccess,
        b: RegisterAccess,
        offset: i16,
    },
}

/// Widest value an E-format immediate may carry: 45 bits, which is what
/// remains of the 64-bit word once the opcode byte (8 bits) and one
/// register access (11 bits) are accounted for.
pub const E_IMMEDIATE_BITS: u32 = 45;
pub const E_IMMEDIATE_MAX: u64 = (1u64 << E_IMMEDIATE_BITS) - 1;

/// Widest magnitude an R-format 24-bit immediate may carry.
pub const R_IMMEDIATE_BITS: u32 = 24;

impl Encoded {
    pub fn pack(self) -> u64 {
        match self {
            Encoded::N { op, greedy } => op.to_byte(greedy, false) as u64,
            Encoded::T { op, greedy, a, b, c } => {
                let mut word = op.to_byte(greedy, false) as u64;
                word |= a.pack() << 8;
                word |= b.pack() << (8 + RegisterAccess::WIDTH);
                word |= c.pack() << (8 + 2 * RegisterAccess::WIDTH);
                word
            }
            Encoded::D { op, greedy, a, b } => {
                let mut word = op.to_byte(greedy, false) as u64;
                word |= a.pack() << 8;
                word |= b.pack() << (8 + RegisterAccess::WIDTH);
                word
            }
            Encoded::S { op, greedy, a } => {
                let mut word = op.to_byte(greedy, false) as u64;
                word |= a.pack() << 8;
                word
            }
            Encoded::F { op, greedy, a, imm } => {
                let mut word = op.to_byte(greedy, false) as u64;
                word |= a.pack() << 8;
                word |= (imm as u64) << (8 + RegisterAccess::WIDTH);
                word
            }
            Encoded::E { op, greedy, a, imm } => {
                let mut word = op.to_byte(greedy, false) as u64;
                word |= a.pack() << 8;
                word |= (imm & E_IMMEDIATE_MAX) << (8 + RegisterAccess::WIDTH);
                word
            }
            Encoded::R {
                op,
                greedy,
                unsigned,
                a,
                b,
                imm,
            } => {
                let mut word = op.to_byte(greedy, unsigned) as u64;
                word |= a.pack() << 8;
                word |= b.pack() << (8 + RegisterAccess::WIDTH);
                let imm_bits = (imm as u32) & ((1u32 << R_IMMEDIATE_BITS) - 1);
                word |= (imm_bits as u64) << (8 + 2 * RegisterAccess::WIDTH);
                word
            }
            Encoded::M {
                op,
                greedy,
                unit,
                a,
                b,
                offset,
            } => {
                let mut word = op.to_byte(greedy, false) as u64;
                word |= unit.bits() << 8;
                word |= a.pack() << 11;
                word |= b.pack() << (11 + RegisterAccess::WIDTH);
                let offset_bits = (offset as u16) as u64;
                word |= offset_bits << (11 + 2 * RegisterAccess::WIDTH);
                word
            }
        }
    }

    pub fn unpack(word: u64) -> Option<Encoded> {
        let byte = (word & 0xFF) as u8;
        let (op, greedy, unsigned) = Opcode::from_byte(byte)?;
        Some(match op.format() {
            Format::N => Encoded::N { op, greedy },
            Format::T => {
                let a = RegisterAccess::unpack(word >> 8);
                let b = RegisterAccess::unpack(word >> (8 + RegisterAccess::WIDTH));
                let c = RegisterAccess::unpack(word >> (8 + 2 * RegisterAccess::WIDTH));
                Encoded::T { op, greedy, a, b, c }
            }
            Format::D => {
                let a = RegisterAccess::unpack(word >> 8);
                let b = RegisterAccess::unpack(word >> (8 + RegisterAccess::WIDTH));
                Encoded::D { op, greedy, a, b }
            }
            Format::S => {
                let a = RegisterAccess::unpack(word >> 8);
                Encoded::S { op, greedy, a }
            }
            Format::F => {
                let a = RegisterAccess::unpack(word >> 8);
                let imm = (word >> (8 + RegisterAccess::WIDTH)) as u32;
                Encoded::F { op, greedy, a, imm }
            }
            Format::E => {
                let a = RegisterAccess::unpack(word >> 8);
                let imm = (word >> (8 + RegisterAccess::WIDTH)) & E_IMMEDIATE_MAX;
                Encoded::E { op, greedy, a, imm }
            }
            Format::R => {
                let a = RegisterAccess::unpack(word >> 8);
                let b = RegisterAccess::unpack(word >> (8 + RegisterAccess::WIDTH));
                let raw = ((word >> (8 + 2 * RegisterAccess::WIDTH)) & 0xFF_FFFF) as u32;
                let imm = sign_extend_24(raw);
                Encoded::R {
                    op,
                    greedy,
                    unsigned,
                    a,
                    b,
                    imm,
                }
            }
            Format::M => {
                let unit_bits = (word >> 8) & 0b111;
                let unit = match unit_bits {
                    0 => Unit::Byte,
                    1 => Unit::Half,
                    2 => Unit::Word,
                    3 => Unit::Double,
                    _ => Unit::Quad,
                };
                let a = RegisterAccess::unpack(word >> 11);
                let b = RegisterAccess::unpack(word >> (11 + RegisterAccess::WIDTH));
                let offset = ((word >> (11 + 2 * RegisterAccess::WIDTH)) & 0xFFFF) as u16 as i16;
                Encoded::M {
                    op,
                    greedy,
                    unit,
                    a,
                    b,
                    offset,
                }
            }
        })
    }

    pub fn opcode(&self) -> Opcode {
        match *self {
            Encoded::N { op, .. }
            | Encoded::T { op, .. }
            | Encoded::D { op, .. }
            | Encoded::S { op, .. }
            | Encoded::F { op, .. }
            | Encoded::E { op, .. }
            | Encoded::R { op, .. }
            | Encoded::M { op, .. } => op,
        }
    }
}

fn sign_extend_24(raw: u32) -> i32 {
    let shifted = raw << 8;
    (shifted as i32) >> 8
}

/// Range-check a register index against the 8-bit field width.
pub fn check_register_index(value: i64, span: Span) -> Result<u8, Error> {
    if !(0..=255).contains(&value) {
        return Err(Error::invalid_register_access(span, value));
    }
    Ok(value as u8)
}
