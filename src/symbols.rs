//! Document and workspace symbols from the assembled symbol table.

use tower_lsp::lsp_types::{Location, SymbolInformation, SymbolKind};

use crate::assembler::Symbol;
use crate::attribution::{definition_file, definition_range, is_defined_in};
use crate::project::Project;
use crate::uri::FileUri;

/// Symbols defined in `uri`, in symbol table order.
pub fn document_symbols(project: &Project, uri: &FileUri) -> Vec<SymbolInformation> {
    let Some(result) = project.result() else {
        return Vec::new();
    };
    let Ok(url) = uri.to_url() else {
        return Vec::new();
    };
    let files = project.files();
    result
        .symbols()
        .iter()
        .filter(|symbol| is_defined_in(symbol, files, uri))
        .filter_map(|symbol| {
            let range = definition_range(symbol)?;
            Some(symbol_information(symbol, Location::new(url.clone(), range)))
        })
        .collect()
}

/// Symbols of every project whose name contains `query`, ignoring case.
pub fn workspace_symbols<'a>(
    projects: impl IntoIterator<Item = &'a Project>,
    query: &str,
) -> Vec<SymbolInformation> {
    let query = query.to_lowercase();
    let mut out = Vec::new();
    for project in projects {
        let Some(result) = project.result() else {
            continue;
        };
        for symbol in result.symbols() {
            if !symbol.name.to_lowercase().contains(&query) {
                continue;
            }
            let Some(range) = definition_range(symbol) else {
                continue;
            };
            let Some(url) = definition_file(symbol, project.files())
                .and_then(|file| file.uri().to_url().ok())
            else {
                continue;
            };
            out.push(symbol_information(symbol, Location::new(url, range)));
        }
    }
    out
}

fn symbol_information(symbol: &Symbol, location: Location) -> SymbolInformation {
    #[allow(deprecated)]
    SymbolInformation {
        name: symbol.name.clone(),
        kind: if symbol.is_label {
            SymbolKind::FUNCTION
        } else {
            SymbolKind::CONSTANT
        },
        tags: None,
        deprecated: None,
        location,
        container_name: None,
    }
}
