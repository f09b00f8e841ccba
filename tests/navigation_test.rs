//! Tests for definition, references, rename, highlight, hover and symbols
//! over a two-file project.

mod common;

use common::fixtures::{file_url, find_last_position, find_position, inline};
use common::harness::{hover_text, TestHarness};
use tower_lsp::lsp_types::{
    CompletionItemKind, CompletionParams, CompletionResponse, DocumentChanges,
    DocumentHighlightKind, OneOf, Position, Range, SymbolKind, TextDocumentIdentifier,
    TextDocumentPositionParams, Url,
};
use tower_lsp::LanguageServer;

async fn header_project() -> (TestHarness, Url, Url) {
    let harness = TestHarness::new();
    let header = harness.write_file("/p/vcs.h", inline::VCS_H);
    let main = harness.open("/p/main.asm", inline::MAIN_WITH_HEADER).await;
    (harness, main, header)
}

fn range(line: u32, start: u32, end: u32) -> Range {
    Range::new(Position::new(line, start), Position::new(line, end))
}

#[tokio::test]
async fn definition_crosses_into_included_file() {
    let (harness, main, header) = header_project().await;

    let loc = harness
        .goto_definition_at(&main, inline::MAIN_WITH_HEADER, "SCORE")
        .await
        .expect("definition of SCORE");
    assert_eq!(loc.uri, header);
    assert_eq!(loc.range, range(1, 0, 5));
}

#[tokio::test]
async fn definition_of_local_label() {
    let (harness, main, _) = header_project().await;

    let pos = find_last_position(inline::MAIN_WITH_HEADER, "Start");
    let loc = harness.goto_definition(&main, pos).await.expect("definition");
    assert_eq!(loc.uri, main);
    assert_eq!(loc.range, range(3, 0, 5));
}

#[tokio::test]
async fn definition_needs_a_known_symbol() {
    let (harness, main, _) = header_project().await;

    // `processor` is a pseudo-op, not a symbol.
    let pos = find_position(inline::MAIN_WITH_HEADER, "processor");
    assert!(harness.goto_definition(&main, pos).await.is_none());
    // Blank space between tokens.
    assert!(harness
        .goto_definition(&main, Position::new(2, 5))
        .await
        .is_none());
}

#[tokio::test]
async fn references_skip_comments() {
    let (harness, main, header) = header_project().await;
    let pos = find_position(inline::MAIN_WITH_HEADER, "SCORE");

    let with_decl = harness.find_references(&main, pos, true).await;
    let spots: Vec<(Url, Range)> = with_decl
        .iter()
        .map(|loc| (loc.uri.clone(), loc.range))
        .collect();
    assert_eq!(
        spots,
        vec![
            (main.clone(), range(4, 6, 11)),
            (main.clone(), range(5, 5, 10)),
            (header.clone(), range(1, 0, 5)),
        ]
    );

    let without_decl = harness.find_references(&main, pos, false).await;
    assert_eq!(without_decl.len(), 2);
    assert!(without_decl.iter().all(|loc| loc.uri == main));
}

#[tokio::test]
async fn rename_edits_every_file_but_not_comments() {
    let (harness, main, header) = header_project().await;
    let pos = find_position(inline::MAIN_WITH_HEADER, "SCORE");

    let edit = harness
        .rename(&main, pos, "POINTS")
        .await
        .expect("rename edit");
    let Some(DocumentChanges::Edits(edits)) = edit.document_changes else {
        panic!("expected versioned document edits");
    };
    assert_eq!(edits.len(), 2);

    let main_edit = edits
        .iter()
        .find(|edit| edit.text_document.uri == main)
        .expect("edit for main");
    assert_eq!(main_edit.text_document.version, Some(1));
    assert_eq!(main_edit.edits.len(), 2);

    let header_edit = edits
        .iter()
        .find(|edit| edit.text_document.uri == header)
        .expect("edit for header");
    assert_eq!(header_edit.text_document.version, None);
    let OneOf::Left(text_edit) = &header_edit.edits[0] else {
        panic!("expected a plain text edit");
    };
    assert_eq!(text_edit.range, range(1, 0, 5));
    assert_eq!(text_edit.new_text, "POINTS");
}

#[tokio::test]
async fn highlights_classify_occurrences() {
    let (harness, main, header) = header_project().await;

    let pos = find_last_position(inline::MAIN_WITH_HEADER, "SCORE");
    let kinds: Vec<_> = harness
        .highlights(&main, pos)
        .await
        .into_iter()
        .map(|highlight| highlight.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(DocumentHighlightKind::READ),
            Some(DocumentHighlightKind::TEXT),
            Some(DocumentHighlightKind::READ),
        ]
    );

    harness.open("/p/vcs.h", inline::VCS_H).await;
    let kinds: Vec<_> = harness
        .highlights(&header, Position::new(1, 2))
        .await
        .into_iter()
        .map(|highlight| highlight.kind)
        .collect();
    assert_eq!(kinds, vec![Some(DocumentHighlightKind::WRITE)]);
}

#[tokio::test]
async fn hover_shows_symbol_value() {
    let (harness, main, _) = header_project().await;

    let hover = harness
        .hover_at(&main, inline::MAIN_WITH_HEADER, "SCORE")
        .await
        .expect("hover over SCORE");
    let text = hover_text(&hover);
    assert!(text.contains("(symbol) `SCORE`"), "{text}");
    assert!(text.contains("* Decimal: `128`"), "{text}");
    assert!(text.contains("* Hexa: `$80`"), "{text}");
    assert_eq!(hover.range, Some(range(4, 6, 11)));
}

#[tokio::test]
async fn hover_describes_language_keywords() {
    let (harness, main, _) = header_project().await;

    let text = hover_text(
        &harness
            .hover_at(&main, inline::MAIN_WITH_HEADER, "lda")
            .await
            .expect("hover over lda"),
    );
    assert!(text.starts_with("(instruction) `LDA`"), "{text}");

    let text = hover_text(
        &harness
            .hover_at(&main, inline::MAIN_WITH_HEADER, "include")
            .await
            .expect("hover over include"),
    );
    assert!(text.starts_with("(pseudo-op) `INCLUDE`"), "{text}");

    let text = hover_text(
        &harness
            .hover_at(&main, inline::MAIN_WITH_HEADER, "Start")
            .await
            .expect("hover over Start"),
    );
    assert!(text.starts_with("(label) `Start`"), "{text}");
}

#[tokio::test]
async fn hover_is_never_offered_inside_comments() {
    let (harness, main, header) = header_project().await;

    // `SCORE` after the semicolon on line 4.
    assert!(harness.hover(&main, Position::new(4, 20)).await.is_none());
    assert!(harness.hover(&main, Position::new(4, 22)).await.is_none());
    // `hardware` in the header's comment.
    assert!(harness.hover(&header, Position::new(0, 4)).await.is_none());
}

#[tokio::test]
async fn document_symbols_only_list_local_definitions() {
    let (harness, main, header) = header_project().await;

    let names: Vec<(String, SymbolKind)> = harness
        .document_symbols(&main)
        .await
        .into_iter()
        .map(|symbol| (symbol.name, symbol.kind))
        .collect();
    assert_eq!(names, vec![("Start".to_string(), SymbolKind::FUNCTION)]);

    let symbols = harness.document_symbols(&header).await;
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].name, "SCORE");
    assert_eq!(symbols[0].kind, SymbolKind::CONSTANT);
    assert_eq!(symbols[0].location.uri, header);
}

#[tokio::test]
async fn workspace_symbols_match_case_insensitively() {
    let (harness, _, header) = header_project().await;
    harness.open("/q/other.asm", "Score2 = 1\n").await;

    let symbols = harness.workspace_symbols("score").await;
    let found: Vec<(&str, &Url)> = symbols
        .iter()
        .map(|symbol| (symbol.name.as_str(), &symbol.location.uri))
        .collect();
    assert_eq!(
        found,
        vec![("SCORE", &header), ("Score2", &file_url("/q/other.asm"))]
    );
}

#[tokio::test]
async fn document_links_point_at_includes() {
    let (harness, main, header) = header_project().await;

    let links = harness.document_links(&main).await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].target.as_ref(), Some(&header));
    assert_eq!(links[0].range, range(1, 9, 16));
    assert_eq!(links[0].tooltip.as_deref(), Some("vcs.h"));
}

#[tokio::test]
async fn completion_offers_assembled_symbols() {
    let (harness, main, _) = header_project().await;

    let response = harness
        .backend
        .completion(CompletionParams {
            text_document_position: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri: main },
                position: Position::new(6, 1),
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: None,
        })
        .await
        .unwrap();
    let Some(CompletionResponse::Array(items)) = response else {
        panic!("expected completion items");
    };
    let score = items
        .iter()
        .find(|item| item.label == "SCORE")
        .expect("SCORE offered");
    assert_eq!(score.kind, Some(CompletionItemKind::CONSTANT));
    assert!(items.iter().any(|item| item.label == "lda"));

    let resolved = harness
        .backend
        .completion_resolve(score.clone())
        .await
        .unwrap();
    assert_eq!(resolved.detail.as_deref(), Some("Symbol SCORE with value 128"));
}
