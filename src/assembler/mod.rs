//! Assembler contract.
//!
//! The assembler is consumed as a pure function of the entry source and a flat
//! map of include files. [`dasm::DasmAssembler`] drives the real `dasm`
//! executable; tests substitute their own implementations.

pub mod dasm;
pub mod listing;

use std::collections::BTreeMap;

use thiserror::Error;

pub use dasm::DasmAssembler;

/// One line of the assembler listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingLine {
    /// 1-based line number inside `filename`.
    pub number: u32,
    /// File the line came from, as named in the include directive.
    /// `None` for the entry file.
    pub filename: Option<String>,
    pub address: u32,
    pub bytes: Option<Vec<u8>>,
    pub raw: String,
    pub error_message: Option<String>,
    pub comment: Option<String>,
    pub command: Option<String>,
}

/// An entry of the assembler's global symbol table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    /// Labels carry an address; everything else is a value.
    pub is_label: bool,
    pub value: i64,
    pub was_referenced: bool,
    pub was_pseudo_op_created: bool,
    /// Defining file as named in the include directive. `None` for the entry file.
    pub definition_filename: Option<String>,
    /// 1-based defining line; 0 when the assembler did not report one.
    pub definition_line: u32,
    pub definition_column_start: u32,
    pub definition_column_end: u32,
}

impl Symbol {
    pub fn is_constant(&self) -> bool {
        !self.is_label
    }

    pub fn has_definition(&self) -> bool {
        self.definition_line > 0
    }
}

/// Output of one assembly pass. Replaced wholesale on every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyResult {
    pub data: Vec<u8>,
    pub output: Vec<String>,
    pub listing: Option<Vec<ListingLine>>,
    pub symbols: Option<Vec<Symbol>>,
    pub exit_status: i32,
    pub success: bool,
}

impl AssemblyResult {
    /// A result for a pass that never produced assembler output.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            output: vec![message.into()],
            exit_status: -1,
            ..Self::default()
        }
    }

    pub fn listing(&self) -> &[ListingLine] {
        self.listing.as_deref().unwrap_or_default()
    }

    pub fn symbols(&self) -> &[Symbol] {
        self.symbols.as_deref().unwrap_or_default()
    }

    /// Look up a symbol by its exact name.
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols().iter().find(|symbol| symbol.name == name)
    }

    /// Listing lines that carry an error message.
    pub fn errors(&self) -> impl Iterator<Item = &ListingLine> {
        self.listing()
            .iter()
            .filter(|line| line.error_message.is_some())
    }
}

/// The external assembler: entry source plus entry-relative includes in, result out.
///
/// Implementations report assembly-level problems through the returned
/// listing and `success` flag instead of failing.
pub trait Assembler: Send + Sync + 'static {
    fn assemble(&self, source: &str, includes: &BTreeMap<String, String>) -> AssemblyResult;
}

#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("failed to prepare assembly directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
