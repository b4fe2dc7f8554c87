//! # Diagnostics
//!
//! The structured error value threaded through every pipeline stage, plus
//! the colorized renderer that turns it into terminal output anchored to
//! source spans.
//!
//! Every detected problem in the core is fatal (spec.md §7): there is no
//! recoverable-error variant, stages return `Result<T, Error>` and the first
//! failure propagates straight to the CLI boundary.

use std::fmt;

use colored::{ColoredString, Colorize};

use crate::lexer::token::Lexeme;
use crate::suggest;

/// A byte-and-line-anchored region of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn dummy() -> Span {
        Span {
            start: 0,
            end: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

/// The closed set of diagnostic causes the core can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    InvalidToken,
    UnexpectedToken,
    UnknownOpcode,
    UnknownLabel,
    InvalidOperand,
    InvalidRegisterAccess,
    InvalidCast,
    InvalidReference,
    ValueOutOfRange,
    JumpToUndefinedLabel,
    CallToUndefinedFunction,
    TooFewOperands,
    DuplicatedEntryPoint,
    None,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Cause::InvalidToken => "invalid token",
            Cause::UnexpectedToken => "unexpected token",
            Cause::UnknownOpcode => "unknown opcode",
            Cause::UnknownLabel => "unknown label",
            Cause::InvalidOperand => "invalid operand",
            Cause::InvalidRegisterAccess => "invalid register access",
            Cause::InvalidCast => "invalid cast",
            Cause::InvalidReference => "invalid reference",
            Cause::ValueOutOfRange => "value out of range",
            Cause::JumpToUndefinedLabel => "jump to undefined label",
            Cause::CallToUndefinedFunction => "call to undefined function",
            Cause::TooFewOperands => "too few operands",
            Cause::DuplicatedEntryPoint => "duplicated entry point",
            Cause::None => "error",
        };
        f.write_str(text)
    }
}

/// A structured diagnostic. `chain` links to further errors that continue
/// the narrative — e.g. the current error plus a "previously declared here"
/// pointing at an earlier span.
#[derive(Debug, Clone)]
pub struct Error {
    pub cause: Cause,
    pub message: String,
    pub primary: Span,
    pub extra: Vec<Span>,
    pub aside: Option<String>,
    pub note: Option<String>,
    pub chain: Vec<Error>,
}

impl Error {
    pub fn new(cause: Cause, message: impl Into<String>, primary: Span) -> Error {
        Error {
            cause,
            message: message.into(),
            primary,
            extra: Vec::new(),
            aside: None,
            note: None,
            chain: Vec::new(),
        }
    }

    pub fn with_extra(mut self, span: Span) -> Error {
        self.extra.push(span);
        self
    }

    pub fn with_aside(mut self, aside: impl Into<String>) -> Error {
        self.aside = Some(aside.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Error {
        self.note = Some(note.into());
        self
    }

    pub fn chained(mut self, next: Error) -> Error {
        self.chain.push(next);
        self
    }

    pub fn invalid_token(primary: Span, text: impl Into<String>) -> Error {
        let text = text.into();
        Error::new(Cause::InvalidToken, format!("invalid token `{text}`"), primary)
    }

    pub fn unexpected_token(primary: Span, found: impl fmt::Display) -> Error {
        Error::new(
            Cause::UnexpectedToken,
            format!("unexpected token `{found}`"),
            primary,
        )
    }

    /// `spec.md` §4.2: unknown opcode, with a Levenshtein "did you mean"
    /// suggestion drawn from the known opcode set.
    pub fn unknown_opcode(primary: Span, misspelled: &str, known: &[&str]) -> Error {
        let mut err = Error::new(
            Cause::UnknownOpcode,
            format!("unknown opcode `{misspelled}`"),
            primary,
        );
        if let Some(suggestion) = suggest::did_you_mean(misspelled, known) {
            err = err.with_aside(format!("did you mean \"{suggestion}\"?"));
        }
        err
    }

    pub fn unknown_label(primary: Span, misspelled: &str, known: &[&str]) -> Error {
        let mut err = Error::new(
            Cause::UnknownLabel,
            format!("unknown label `{misspelled}`"),
            primary,
        );
        if let Some(suggestion) = suggest::did_you_mean(misspelled, known) {
            err = err.with_aside(format!("did you mean \"{suggestion}\"?"));
        }
        err
    }

    /// `spec.md` §7: `if`'s label operand does not resolve to any symbol.
    pub fn jump_to_undefined_label(primary: Span, misspelled: &str, known: &[&str]) -> Error {
        let mut err = Error::new(
            Cause::JumpToUndefinedLabel,
            format!("jump to undefined label `{misspelled}`"),
            primary,
        );
        if let Some(suggestion) = suggest::did_you_mean(misspelled, known) {
            err = err.with_aside(format!("did you mean \"{suggestion}\"?"));
        }
        err
    }

    /// `spec.md` §7: `call`/`actor`'s label operand does not resolve to any symbol.
    pub fn call_to_undefined_function(primary: Span, misspelled: &str, known: &[&str]) -> Error {
        let mut err = Error::new(
            Cause::CallToUndefinedFunction,
            format!("call to undefined function `{misspelled}`"),
            primary,
        );
        if let Some(suggestion) = suggest::did_you_mean(misspelled, known) {
            err = err.with_aside(format!("did you mean \"{suggestion}\"?"));
        }
        err
    }

    pub fn invalid_register_access(primary: Span, index: i64) -> Error {
        Error::new(
            Cause::InvalidRegisterAccess,
            format!("register index {index} does not fit in 8 bits (0..=255)"),
            primary,
        )
    }

    pub fn invalid_cast(primary: Span, misspelled: &str, known: &[&str]) -> Error {
        let mut err = Error::new(
            Cause::InvalidCast,
            format!("`{misspelled}` is not a fundamental type"),
            primary,
        );
        if let Some(suggestion) = suggest::did_you_mean(misspelled, known) {
            err = err.with_aside(format!("did you mean \"{suggestion}\"?"));
        }
        err
    }

    pub fn invalid_reference(primary: Span, message: impl Into<String>) -> Error {
        Error::new(Cause::InvalidReference, message, primary)
    }

    pub fn invalid_operand(primary: Span, message: impl Into<String>) -> Error {
        Error::new(Cause::InvalidOperand, message, primary)
    }

    pub fn value_out_of_range(primary: Span, message: impl Into<String>) -> Error {
        Error::new(Cause::ValueOutOfRange, message, primary)
    }

    pub fn too_few_operands(primary: Span, message: impl Into<String>) -> Error {
        Error::new(Cause::TooFewOperands, message, primary)
    }

    pub fn duplicated_entry_point(primary: Span, first: Span) -> Error {
        Error::new(
            Cause::DuplicatedEntryPoint,
            "multiple [[entry_point]] symbols declared",
            primary,
        )
        .chained(Error::new(
            Cause::None,
            "first entry point declared here",
            first,
        ))
    }

    /// Render the diagnostic against the original source text, with one
    /// annotated line per span and color-coded severity, matching the
    /// scheme described in `spec.md` §7: primary token in red, asides and
    /// notes in a neutral color, chained errors printed recursively.
    pub fn render(&self, source: &str, path: &str) -> String {
        let mut out = String::new();
        self.render_into(&mut out, source, path, 0);
        out
    }

    fn render_into(&self, out: &mut String, source: &str, path: &str, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&format!(
            "{indent}{}: {}\n",
            "error".red().bold(),
            self.message.bold()
        ));
        out.push_str(&format!(
            "{indent}  {} {path}:{}:{}\n",
            "-->".blue(),
            self.primary.line,
            self.primary.col
        ));
        render_span_snippet(out, source, &indent, self.primary, true);
        for span in &self.extra {
            render_span_snippet(out, source, &indent, *span, false);
        }
        if let Some(aside) = &self.aside {
            out.push_str(&format!("{indent}  {} {aside}\n", "=".cyan()));
        }
        if let Some(note) = &self.note {
            out.push_str(&format!("{indent}  {} {note}\n", "note:".cyan()));
        }
        if !self.chain.is_empty() {
            out.push_str(&format!(
                "{indent}  {}\n",
                "--- related ---".dimmed()
            ));
            for next in &self.chain {
                next.render_into(out, source, path, depth + 1);
            }
        }
    }
}

fn render_span_snippet(out: &mut String, source: &str, indent: &str, span: Span, primary: bool) {
    let Some(line_text) = source.lines().nth(span.line.saturating_sub(1)) else {
        return;
    };
    let gutter = format!("{:>4} | ", span.line);
    out.push_str(&format!("{indent}{gutter}{line_text}\n"));
    let underline_col = span.col.saturating_sub(1);
    let underline_len = span.len().max(1);
    let padding = " ".repeat(gutter.len() + underline_col);
    let marker: ColoredString = if primary {
        "^".repeat(underline_len).red().bold()
    } else {
        "~".repeat(underline_len).yellow()
    };
    out.push_str(&format!("{indent}{padding}{marker}\n"));
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error ({}:{}): {}",
            self.primary.line, self.primary.col, self.message
        )
    }
}

impl std::error::Error for Error {}

/// Convenience used by stages that want to anchor an error on a lexeme
/// rather than a bare span.
pub fn at(lexeme: &Lexeme) -> Span {
    lexeme.span
}
