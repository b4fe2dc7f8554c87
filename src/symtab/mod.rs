//! # Symbol collector
//!
//! Walks the AST once to allocate symbol table entries for declared
//! symbols and validate visibility attributes, then walks it a second time
//! to cache `.text` labels as either bindings to an already-declared
//! function symbol or freshly synthesized jump-target symbols.

#[cfg(test)]
mod tests;

use crate::error::{Error, Span};
use crate::parser::ast::{Node, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolType {
    Func,
    Object,
    NoType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Local,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Default,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionId {
    None,
    Text,
    Rodata,
}

/// Models ELF64 `Sym64`. `value`/`size` start at zero and are filled in by
/// the object materializer (for `.rodata` symbols) or the instruction
/// cooker (for `.text` symbols).
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: SymbolType,
    pub binding: Binding,
    pub visibility: Visibility,
    pub section: SectionId,
    pub value: u64,
    pub size: u64,
    pub is_extern: bool,
    pub is_entry_point: bool,
    /// `None` for anonymous symbols (inline atom/double literals).
    pub declared_at: Span,
}

/// Insertion-ordered symbol table. Anonymous symbols (empty name) are
/// addressable only by index, never by `lookup`.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    names: Vec<(String, usize)>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn push(&mut self, symbol: Symbol) -> usize {
        let index = self.symbols.len();
        if !symbol.name.is_empty() {
            self.names.push((symbol.name.clone(), index));
        }
        self.symbols.push(symbol);
        index
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, idx)| *idx)
    }

    pub fn get(&self, index: usize) -> &Symbol {
        &self.symbols[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Symbol {
        &mut self.symbols[index]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Symbol)> {
        self.symbols.iter().enumerate()
    }

    pub fn known_names(&self) -> Vec<&str> {
        self.names.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// Walk the AST once, building the symbol table from `declare_symbol`
/// nodes, then walk it again to cache `.text` labels.
pub fn collect(nodes: &[Node]) -> Result<SymbolTable, Error> {
    let mut table = SymbolTable::new();
    let mut active = SectionId::None;

    for node in nodes {
        if let Some(section) = section_switch(node)? {
            active = section;
            continue;
        }
        if let Payload::Symbol { name } = &node.payload {
            declare_symbol(&mut table, node, name, active)?;
        }
    }

    active = SectionId::None;
    for node in nodes {
        if let Some(section) = section_switch(node)? {
            active = section;
            continue;
        }
        if active != SectionId::Text {
            continue;
        }
        if let Payload::Label { name } = &node.payload {
            cache_text_label(&mut table, node, name)?;
        }
    }

    Ok(table)
}

fn section_switch(node: &Node) -> Result<Option<SectionId>, Error> {
    if let Payload::Section { name } = &node.payload {
        let normalized = name.trim_start_matches('.');
        return match normalized {
            "text" => Ok(Some(SectionId::Text)),
            "rodata" => Ok(Some(SectionId::Rodata)),
            _ => Err(Error::unexpected_token(node.span(), node.leader.kind.clone())
                .with_note(format!("unknown section \".{normalized}\""))),
        };
    }
    Ok(None)
}

fn declare_symbol(
    table: &mut SymbolTable,
    node: &Node,
    name: &str,
    active: SectionId,
) -> Result<(), Error> {
    if active == SectionId::None {
        return Err(Error::unexpected_token(node.span(), node.leader.kind.clone())
            .with_note("a symbol must be declared inside `.text` or `.rodata`"));
    }

    let ty = match active {
        SectionId::Text => SymbolType::Func,
        SectionId::Rodata => SymbolType::Object,
        SectionId::None => unreachable!(),
    };

    let default_binding = match active {
        SectionId::Text => Binding::Global,
        SectionId::Rodata => Binding::Local,
        SectionId::None => unreachable!(),
    };

    let explicit_local = node.has_attr("local");
    let explicit_global = node.has_attr("global");
    if explicit_local && explicit_global {
        return Err(Error::invalid_operand(
            node.span(),
            "a symbol cannot be declared both [[local]] and [[global]]",
        ));
    }
    let binding = if explicit_local {
        Binding::Local
    } else if explicit_global {
        Binding::Global
    } else {
        default_binding
    };

    let visibility = if node.has_attr("hidden") {
        Visibility::Hidden
    } else {
        Visibility::Default
    };

    if ty == SymbolType::Object && binding == Binding::Global && visibility == Visibility::Default
    {
        return Err(Error::invalid_operand(
            node.span(),
            "object symbols cannot be globally visible",
        ));
    }

    table.push(Symbol {
        name: name.to_string(),
        ty,
        binding,
        visibility,
        section: active,
        value: 0,
        size: 0,
        is_extern: node.has_attr("extern"),
        is_entry_point: node.has_attr("entry_point"),
        declared_at: node.span(),
    });

    Ok(())
}

fn cache_text_label(table: &mut SymbolTable, node: &Node, name: &str) -> Result<(), Error> {
    if table.lookup(name).is_some() {
        return Ok(());
    }
    table.push(Symbol {
        name: name.to_string(),
        ty: SymbolType::Func,
        binding: Binding::Local,
        visibility: Visibility::Hidden,
        section: SectionId::Text,
        value: 0,
        size: 0,
        is_extern: false,
        is_entry_point: false,
        declared_at: node.span(),
    });
    Ok(())
}

impl Symbol {
    /// Jump label: local binding, hidden visibility (spec.md glossary).
    pub fn is_jump_label(&self) -> bool {
        self.binding == Binding::Local && self.visibility == Visibility::Hidden
    }

    /// Callable label: global binding, default visibility.
    pub fn is_callable_label(&self) -> bool {
        self.binding == Binding::Global && self.visibility == Visibility::Default
    }
}
