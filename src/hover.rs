//! Hover text for instructions, pseudo-ops, assembled symbols and registers.

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};

use crate::assembler::Symbol;
use crate::attribution::token_at;
use crate::language;
use crate::project::Project;
use crate::uri::FileUri;

/// Hover for the token under `position`, or `None` if nothing is known about it.
pub fn hover(project: &Project, uri: &FileUri, position: Position) -> Option<Hover> {
    let file = project.files().get(uri)?;
    let line = file.line(position.line)?;
    let token = token_at(line, position.character)?;

    let sections = instruction_hover(token.text)
        .or_else(|| pseudo_op_hover(token.text))
        .or_else(|| {
            let result = project.result()?;
            result.symbol(token.text).map(symbol_hover)
        })
        .or_else(|| register_hover(token.text))?;

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: sections.join("\n\n"),
        }),
        range: Some(token.range(position.line)),
    })
}

fn instruction_hover(name: &str) -> Option<Vec<String>> {
    let instruction = language::instruction(name)?;
    Some(vec![format!(
        "(instruction) `{}`: {}",
        instruction.name, instruction.description
    )])
}

fn pseudo_op_hover(name: &str) -> Option<Vec<String>> {
    let op = language::pseudo_op(name)?;
    let mut sections = vec![format!("(pseudo-op) `{}`: {}", op.name, op.description)];
    sections.extend(op.documentation.iter().map(|line| line.to_string()));
    Some(sections)
}

fn symbol_hover(symbol: &Symbol) -> Vec<String> {
    let kind = if symbol.is_label { "label" } else { "symbol" };
    vec![
        format!("({kind}) `{}`", symbol.name),
        format_value(symbol.value),
    ]
}

fn register_hover(name: &str) -> Option<Vec<String>> {
    let register = language::register(name)?;
    Some(vec![
        format!("`{}` (register)", register.name),
        format!("{} ({}-bit)", register.description, register.bits),
    ])
}

/// The value in the notations DASM accepts: decimal, `%` binary, `0` octal, `$` hex.
pub fn format_value(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    format!(
        "* Decimal: `{value}`\n\
         * Binary: `%{sign}{magnitude:b}`\n\
         * Octal: `0{sign}{magnitude:o}`\n\
         * Hexa: `${sign}{magnitude:x}`"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_value_in_all_notations() {
        assert_eq!(
            format_value(255),
            "* Decimal: `255`\n* Binary: `%11111111`\n* Octal: `0377`\n* Hexa: `$ff`"
        );
        assert!(format_value(-2).contains("`%-10`"));
    }

    #[test]
    fn language_hovers_match_case_insensitively() {
        let lda = instruction_hover("lda").unwrap();
        assert_eq!(lda, vec!["(instruction) `LDA`: LoaD the Accumulator"]);

        let byte = pseudo_op_hover(".byte").unwrap();
        assert_eq!(byte[0], "(pseudo-op) `DC`: Declare data (byte)");
        assert!(byte.len() > 1);

        let x = register_hover("x").unwrap();
        assert_eq!(x[0], "`X` (register)");
    }

    #[test]
    fn symbols_show_kind() {
        let symbol = Symbol {
            name: "SCORE".to_string(),
            value: 0x80,
            ..Symbol::default()
        };
        assert_eq!(symbol_hover(&symbol)[0], "(symbol) `SCORE`");
        let label = Symbol {
            is_label: true,
            ..symbol
        };
        assert_eq!(symbol_hover(&label)[0], "(label) `SCORE`");
    }
}
