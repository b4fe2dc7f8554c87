//! # Parser
//!
//! Recursive-descent consumer over the cleaned lexeme vector, producing an
//! ordered vector of top-level AST nodes.

pub mod ast;

#[cfg(test)]
mod tests;

use crate::error::Error;
use crate::isa::RegisterSet;
use crate::lexer::token::{Lexeme, LexemeKind};
use crate::mnemonic;
use ast::{Attribute, Node, Operand, OperandKind, Payload};

struct Parser<'a> {
    lexemes: &'a [Lexeme],
    pos: usize,
}

pub fn parse(lexemes: &[Lexeme]) -> Result<Vec<Node>, Error> {
    let mut parser = Parser { lexemes, pos: 0 };
    let mut nodes = Vec::new();

    while !parser.at_eof() {
        nodes.push(parser.parse_node()?);
    }

    Ok(nodes)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Lexeme {
        &self.lexemes[self.pos.min(self.lexemes.len() - 1)]
    }

    fn peek_kind(&self) -> &LexemeKind {
        &self.peek().kind
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, LexemeKind::Eof)
    }

    fn advance(&mut self) -> Lexeme {
        let lexeme = self.peek().clone();
        if self.pos < self.lexemes.len() - 1 {
            self.pos += 1;
        }
        lexeme
    }

    fn expect_terminator(&mut self) -> Result<(), Error> {
        match self.peek_kind() {
            LexemeKind::Terminator | LexemeKind::Eof => {
                self.advance();
                Ok(())
            }
            _ => {
                let found = self.peek().clone();
                Err(Error::unexpected_token(found.span, found.kind.clone())
                    .with_note("expected end of statement"))
            }
        }
    }

    fn parse_node(&mut self) -> Result<Node, Error> {
        // Leading terminators between nodes were already collapsed by the
        // lexer's noise-removal pass, but a Terminator can still appear
        // here between two statements.
        while matches!(self.peek_kind(), LexemeKind::Terminator) {
            self.advance();
        }
        if self.at_eof() {
            return Ok(Node {
                leader: self.peek().clone(),
                attributes: Vec::new(),
                payload: Payload::End,
            });
        }

        match self.peek_kind().clone() {
            LexemeKind::SwitchToSection => self.parse_switch_to_section(),
            LexemeKind::SwitchToText => self.parse_bare_section("text", Payload::Section {
                name: ".text".to_string(),
            }),
            LexemeKind::SwitchToRodata => self.parse_bare_section("rodata", Payload::Section {
                name: ".rodata".to_string(),
            }),
            LexemeKind::DeclareSymbol => self.parse_declare_symbol(),
            LexemeKind::DefineLabel(name) => self.parse_define_label(name),
            LexemeKind::AllocateObject => self.parse_allocate_object(),
            LexemeKind::Begin => self.parse_sentinel(Payload::Begin),
            LexemeKind::End => self.parse_sentinel(Payload::End),
            LexemeKind::AttrListOpen => self.parse_instruction(),
            LexemeKind::Opcode => self.parse_instruction(),
            LexemeKind::LiteralAtom(text) => {
                let found = self.advance();
                let known = mnemonic::all_known_mnemonics();
                Err(Error::unknown_opcode(found.span, &text, &known))
            }
            _ => {
                let found = self.advance();
                Err(Error::unexpected_token(found.span, found.kind.clone()).with_note(
                    "expected a section switch, symbol/label declaration, object allocation, or instruction",
                ))
            }
        }
    }

    fn parse_attributes(&mut self) -> Result<Vec<Attribute>, Error> {
        let mut attributes = Vec::new();
        if !matches!(self.peek_kind(), LexemeKind::AttrListOpen) {
            return Ok(attributes);
        }
        self.advance();
        loop {
            if matches!(self.peek_kind(), LexemeKind::AttrListClose) {
                self.advance();
                break;
            }
            let key = self.advance();
            let value = if matches!(self.peek_kind(), LexemeKind::Eq) {
                self.advance();
                Some(self.advance())
            } else {
                None
            };
            attributes.push(Attribute { key, value });
            match self.peek_kind() {
                LexemeKind::Comma => {
                    self.advance();
                }
                LexemeKind::AttrListClose => {
                    self.advance();
                    break;
                }
                _ => {
                    let found = self.peek().clone();
                    return Err(Error::unexpected_token(found.span, found.kind.clone())
                        .with_note("expected `,` or `]]` in attribute list"));
                }
            }
        }
        Ok(attributes)
    }

    fn parse_switch_to_section(&mut self) -> Result<Node, Error> {
        let leader = self.advance();
        let attributes = self.parse_attributes()?;
        let name_lexeme = self.advance();
        let name = match &name_lexeme.kind {
            LexemeKind::LiteralString(s) => s.clone(),
            _ => {
                return Err(Error::unexpected_token(name_lexeme.span, name_lexeme.kind.clone())
                    .with_note("expected a string literal naming the section"))
            }
        };
        self.expect_terminator()?;
        Ok(Node {
            leader,
            attributes,
            payload: Payload::Section { name },
        })
    }

    fn parse_bare_section(&mut self, _keyword: &str, payload: Payload) -> Result<Node, Error> {
        let leader = self.advance();
        let attributes = self.parse_attributes()?;
        self.expect_terminator()?;
        Ok(Node {
            leader,
            attributes,
            payload,
        })
    }

    fn parse_declare_symbol(&mut self) -> Result<Node, Error> {
        let leader = self.advance();
        let attributes = self.parse_attributes()?;
        let name_lexeme = self.advance();
        let name = match &name_lexeme.kind {
            LexemeKind::LiteralAtom(s) | LexemeKind::LiteralString(s) => s.clone(),
            _ => {
                return Err(Error::unexpected_token(name_lexeme.span, name_lexeme.kind.clone())
                    .with_note("expected a symbol name"))
            }
        };
        self.expect_terminator()?;
        Ok(Node {
            leader,
            attributes,
            payload: Payload::Symbol { name },
        })
    }

    fn parse_define_label(&mut self, name: String) -> Result<Node, Error> {
        let leader = self.advance();
        let attributes = self.parse_attributes()?;
        self.expect_terminator()?;
        Ok(Node {
            leader,
            attributes,
            payload: Payload::Label { name },
        })
    }

    fn parse_sentinel(&mut self, payload: Payload) -> Result<Node, Error> {
        let leader = self.advance();
        let attributes = self.parse_attributes()?;
        self.expect_terminator()?;
        Ok(Node {
            leader,
            attributes,
            payload,
        })
    }

    fn parse_allocate_object(&mut self) -> Result<Node, Error> {
        let leader = self.advance();
        let attributes = self.parse_attributes()?;
        let ty_lexeme = self.advance();
        let ty = match &ty_lexeme.kind {
            LexemeKind::LiteralAtom(s) => s.clone(),
            _ => {
                return Err(Error::unexpected_token(ty_lexeme.span, ty_lexeme.kind.clone())
                    .with_note("expected an object type name, e.g. `string`"))
            }
        };
        let mut ctor = Vec::new();
        while !matches!(self.peek_kind(), LexemeKind::Terminator | LexemeKind::Eof) {
            ctor.push(self.advance());
        }
        self.expect_terminator()?;
        Ok(Node {
            leader,
            attributes,
            payload: Payload::Object { ty, ctor },
        })
    }

    fn parse_instruction(&mut self) -> Result<Node, Error> {
        let attributes = self.parse_attributes()?;
        let opcode_lexeme = self.advance();
        let LexemeKind::Opcode = &opcode_lexeme.kind else {
            return Err(Error::unexpected_token(
                opcode_lexeme.span,
                opcode_lexeme.kind.clone(),
            )
            .with_note("expected an opcode"));
        };
        let (greedy, mnemonic) = mnemonic::strip_greedy(&opcode_lexeme.text);
        let mnemonic = mnemonic.to_string();

        let mut operands = Vec::new();
        if !matches!(self.peek_kind(), LexemeKind::Terminator | LexemeKind::Eof) {
            loop {
                operands.push(self.parse_operand()?);
                match self.peek_kind() {
                    LexemeKind::Comma => {
                        self.advance();
                        if matches!(self.peek_kind(), LexemeKind::Terminator | LexemeKind::Eof) {
                            let found = self.peek().clone();
                            return Err(Error::unexpected_token(found.span, found.kind.clone())
                                .with_note("expected an operand to follow a comma"));
                        }
                    }
                    _ => break,
                }
            }
        }
        self.expect_terminator()?;

        Ok(Node {
            leader: opcode_lexeme,
            attributes,
            payload: Payload::Instruction {
                mnemonic,
                greedy,
                operands,
            },
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, Error> {
        let attributes = self.parse_attributes()?;
        let lexeme = self.advance();
        let span = lexeme.span;

        let kind = match &lexeme.kind {
            LexemeKind::Void => OperandKind::Void,
            LexemeKind::Dollar => self.parse_register_access()?,
            LexemeKind::At => {
                let name_lexeme = self.advance();
                match &name_lexeme.kind {
                    LexemeKind::LiteralAtom(s) | LexemeKind::LiteralString(s) => {
                        OperandKind::Label(s.clone())
                    }
                    _ => {
                        return Err(Error::unexpected_token(
                            name_lexeme.span,
                            name_lexeme.kind.clone(),
                        )
                        .with_note("expected a label name after `@`"))
                    }
                }
            }
            LexemeKind::LiteralInteger { value, unsigned } => OperandKind::Integer {
                value: *value,
                unsigned: *unsigned,
            },
            LexemeKind::LiteralFloat(value) => OperandKind::Float(*value),
            LexemeKind::LiteralString(value) => OperandKind::Str(value.clone()),
            LexemeKind::LiteralAtom(name) => {
                if mnemonic::FUNDAMENTAL_TYPES.contains(&name.as_str()) {
                    OperandKind::Type(name.clone())
                } else {
                    OperandKind::Atom(name.clone())
                }
            }
            _ => {
                return Err(Error::unexpected_token(lexeme.span, lexeme.kind.clone())
                    .with_note("expected an operand"))
            }
        };

        Ok(Operand {
            attributes,
            span,
            kind,
        })
    }

    fn parse_register_access(&mut self) -> Result<OperandKind, Error> {
        let index_lexeme = self.advance();
        let LexemeKind::LiteralInteger { value, .. } = index_lexeme.kind else {
            return Err(Error::unexpected_token(
                index_lexeme.span,
                index_lexeme.kind.clone(),
            )
            .with_note("expected a register index after `$`"));
        };
        let index = crate::isa::check_register_index(value, index_lexeme.span)?;

        let mut set = RegisterSet::Local;
        if matches!(self.peek_kind(), LexemeKind::Dot) {
            self.advance();
            let set_lexeme = self.advance();
            let LexemeKind::LiteralAtom(letter) = &set_lexeme.kind else {
                return Err(Error::unexpected_token(
                    set_lexeme.span,
                    set_lexeme.kind.clone(),
                )
                .with_note("expected `l`, `a`, or `p` after `.`"));
            };
            set = match letter.as_str() {
                "l" => RegisterSet::Local,
                "a" => RegisterSet::Argument,
                "p" => RegisterSet::Parameter,
                _ => {
                    return Err(Error::unexpected_token(
                        set_lexeme.span,
                        set_lexeme.kind.clone(),
                    )
                    .with_note("expected `l`, `a`, or `p`"))
                }
            };
        }

        Ok(OperandKind::Register {
            direct: true,
            set,
            index,
        })
    }
}
