//! # Abstract syntax tree
//!
//! Nodes are a tagged variant rather than an inheritance hierarchy
//! (`spec.md` §9 "Polymorphic AST"): every node carries a common header
//! (`leader`, `attributes`) plus one payload variant.

use crate::error::Span;
use crate::isa::RegisterSet;
use crate::lexer::token::Lexeme;

#[derive(Debug, Clone)]
pub struct Attribute {
    pub key: Lexeme,
    pub value: Option<Lexeme>,
}

impl Attribute {
    pub fn name(&self) -> &str {
        &self.key.text
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub leader: Lexeme,
    pub attributes: Vec<Attribute>,
    pub payload: Payload,
}

impl Node {
    pub fn span(&self) -> Span {
        self.leader.span
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name() == name)
    }

    pub fn attr_value(&self, name: &str) -> Option<&Lexeme> {
        self.attributes
            .iter()
            .find(|a| a.name() == name)
            .and_then(|a| a.value.as_ref())
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    Section {
        name: String,
    },
    Symbol {
        name: String,
    },
    Label {
        name: String,
    },
    Object {
        ty: String,
        ctor: Vec<Lexeme>,
    },
    Instruction {
        mnemonic: String,
        greedy: bool,
        operands: Vec<Operand>,
    },
    Begin,
    End,
}

/// A single operand: an attribute bag plus a decoded ingredient.
///
/// `kind` starts out as whatever the parser decoded directly from source
/// and may be rewritten in place by the object materializer (spec.md §4.4)
/// once an inline literal has been turned into a symbol-index reference.
#[derive(Debug, Clone)]
pub struct Operand {
    pub attributes: Vec<Attribute>,
    pub span: Span,
    pub kind: OperandKind,
}

impl Operand {
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperandKind {
    Void,
    Register {
        direct: bool,
        set: RegisterSet,
        index: u8,
    },
    Label(String),
    Integer {
        value: i64,
        unsigned: bool,
    },
    Float(f64),
    Str(String),
    Atom(String),
    Type(String),
    /// A literal rewritten, post-materialization, to a symbol-table index
    /// (spec.md §4.4: "the last operand ... is rewritten in place").
    SymbolIndex(u32),
}
