//! Completion items for the language definition and assembled symbols.

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Documentation, MarkupContent, MarkupKind};
use tracing::debug;

use crate::assembler::AssemblyResult;
use crate::hover::format_value;
use crate::language::{self, INSTRUCTIONS, PSEUDO_OPS, REGISTERS};
use crate::PreferUppercase;

/// Payload carried from `completion` to `completionItem/resolve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum CompletionData {
    Instruction { name: String },
    PseudoOp { name: String },
    Register { name: String },
    Symbol { name: String, value: i64 },
    Label { name: String, value: i64 },
}

/// Every instruction, pseudo-op (alternate names included), register and
/// assembled symbol. Language names are cased per `prefer`.
pub fn completion_items(
    result: Option<&AssemblyResult>,
    prefer: PreferUppercase,
) -> Vec<CompletionItem> {
    let mut items = Vec::new();

    for instruction in INSTRUCTIONS {
        items.push(item(
            cased(instruction.name, prefer.instructions),
            CompletionItemKind::KEYWORD,
            CompletionData::Instruction {
                name: instruction.name.to_string(),
            },
        ));
    }

    for op in PSEUDO_OPS {
        for name in std::iter::once(&op.name).chain(op.other_names) {
            items.push(item(
                cased(name, prefer.pseudo_ops),
                CompletionItemKind::KEYWORD,
                CompletionData::PseudoOp {
                    name: op.name.to_string(),
                },
            ));
        }
    }

    for register in REGISTERS {
        items.push(item(
            cased(register.name, prefer.registers),
            CompletionItemKind::VARIABLE,
            CompletionData::Register {
                name: register.name.to_string(),
            },
        ));
    }

    for symbol in result.map(AssemblyResult::symbols).unwrap_or_default() {
        let (kind, data) = if symbol.is_label {
            (
                CompletionItemKind::FUNCTION,
                CompletionData::Label {
                    name: symbol.name.clone(),
                    value: symbol.value,
                },
            )
        } else {
            (
                CompletionItemKind::CONSTANT,
                CompletionData::Symbol {
                    name: symbol.name.clone(),
                    value: symbol.value,
                },
            )
        };
        items.push(item(symbol.name.clone(), kind, data));
    }

    items
}

/// Fill in detail and documentation for an item produced by [`completion_items`].
///
/// Items without a recognizable payload are returned unchanged.
pub fn resolve(mut item: CompletionItem) -> CompletionItem {
    let Some(data) = item
        .data
        .clone()
        .and_then(|value| serde_json::from_value::<CompletionData>(value).ok())
    else {
        debug!("completion item {:?} has no payload", item.label);
        return item;
    };

    let described = match data {
        CompletionData::Instruction { name } => language::instruction(&name)
            .map(|i| (i.description.to_string(), format!("{} instruction", i.group))),
        CompletionData::PseudoOp { name } => language::pseudo_op(&name).map(|op| {
            let mut docs = op.documentation.join("\n\n");
            if !op.other_names.is_empty() {
                docs.push_str(&format!("\n\nAlso: `{}`", op.other_names.join("`, `")));
            }
            (op.description.to_string(), docs)
        }),
        CompletionData::Register { name } => language::register(&name)
            .map(|r| (r.description.to_string(), format!("{}-bit register", r.bits))),
        CompletionData::Symbol { name, value } => Some((
            format!("Symbol {name} with value {value}"),
            format_value(value),
        )),
        CompletionData::Label { name, value } => Some((
            format!("Label {name} at address {value}"),
            format_value(value),
        )),
    };

    if let Some((detail, documentation)) = described {
        item.detail = Some(detail);
        item.documentation = Some(Documentation::MarkupContent(MarkupContent {
            kind: MarkupKind::Markdown,
            value: documentation,
        }));
    }
    item
}

fn cased(name: &str, uppercase: bool) -> String {
    if uppercase {
        name.to_ascii_uppercase()
    } else {
        name.to_ascii_lowercase()
    }
}

fn item(label: String, kind: CompletionItemKind, data: CompletionData) -> CompletionItem {
    CompletionItem {
        label,
        kind: Some(kind),
        data: serde_json::to_value(data).ok(),
        ..CompletionItem::default()
    }
}
