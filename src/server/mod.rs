//! LSP server implementation for DASM.
//!
//! This module wires together the backend, settings extraction, and LSP handlers.

mod backend;
mod config;
mod lsp;


pub use backend::Backend;
pub use config::{extract_dasm_path, extract_prefer_uppercase};
