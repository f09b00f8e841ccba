//! Build script to generate the compile-time DASM language tables.
//!
//! This script reads `data/dasm.toml` and generates static arrays of
//! instructions, pseudo-ops and registers, plus phf::Map indexes keyed by
//! uppercase name (pseudo-op alternate names included).

use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn main() {
    // Re-run if the language data changes
    println!("cargo:rerun-if-changed=data/dasm.toml");

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("language_tables.rs");
    let mut file = BufWriter::new(File::create(&dest_path).unwrap());

    // Parse the TOML file
    let content =
        std::fs::read_to_string("data/dasm.toml").expect("Failed to read data/dasm.toml");
    let table: toml::Table = content.parse().expect("Failed to parse data/dasm.toml");

    write_extensions(&mut file, &table);
    write_instructions(&mut file, &table);
    write_pseudo_ops(&mut file, &table);
    write_registers(&mut file, &table);
}

fn write_extensions(file: &mut impl Write, table: &toml::Table) {
    let extensions = table
        .get("extensions")
        .and_then(|v| v.as_table())
        .expect("data/dasm.toml is missing [extensions]");
    for (key, constant) in [("source", "SOURCE_EXTENSIONS"), ("include", "INCLUDE_EXTENSIONS")] {
        let values = string_list(extensions.get(key));
        writeln!(
            file,
            "/// File extensions of {key} files.\n\
             pub static {constant}: &[&str] = &[{}];\n",
            literal_list(&values)
        )
        .unwrap();
    }
}

fn write_instructions(file: &mut impl Write, table: &toml::Table) {
    let entries = array_of_tables(table, "instructions");
    let mut index = phf_codegen::Map::new();
    let mut literals = Vec::new();
    for (position, instruction) in entries.iter().enumerate() {
        let name = string_field(instruction, "name");
        literals.push(format!(
            "Instruction {{ name: \"{}\", description: \"{}\", group: \"{}\" }}",
            escape_string(&name),
            escape_string(&string_field(instruction, "description")),
            escape_string(&string_field(instruction, "group")),
        ));
        index.entry(name.to_ascii_uppercase(), &position.to_string());
    }

    writeln!(
        file,
        "/// Every instruction of the 6502, in mnemonic order.\n\
         pub static INSTRUCTIONS: &[Instruction] = &[\n    {}\n];\n",
        literals.join(",\n    ")
    )
    .unwrap();
    writeln!(
        file,
        "/// Maps uppercase mnemonics to their position in `INSTRUCTIONS`.\n\
         static INSTRUCTION_INDEX: phf::Map<&'static str, usize> = {};\n",
        index.build()
    )
    .unwrap();
}

fn write_pseudo_ops(file: &mut impl Write, table: &toml::Table) {
    let entries = array_of_tables(table, "pseudo_ops");
    let mut index = phf_codegen::Map::new();
    let mut literals = Vec::new();
    for (position, op) in entries.iter().enumerate() {
        let name = string_field(op, "name");
        let other_names = string_list(op.get("other_names"));
        let documentation = string_list(op.get("documentation"));
        let can_have_label = op
            .get("can_have_label")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        literals.push(format!(
            "PseudoOp {{ name: \"{}\", other_names: &[{}], can_have_label: {}, description: \"{}\", documentation: &[{}] }}",
            escape_string(&name),
            literal_list(&other_names),
            can_have_label,
            escape_string(&string_field(op, "description")),
            literal_list(&documentation),
        ));
        index.entry(name.to_ascii_uppercase(), &position.to_string());
        for other in &other_names {
            index.entry(other.to_ascii_uppercase(), &position.to_string());
        }
    }

    writeln!(
        file,
        "/// Every DASM pseudo-op.\n\
         pub static PSEUDO_OPS: &[PseudoOp] = &[\n    {}\n];\n",
        literals.join(",\n    ")
    )
    .unwrap();
    writeln!(
        file,
        "/// Maps uppercase pseudo-op names and alternate names to their position in `PSEUDO_OPS`.\n\
         static PSEUDO_OP_INDEX: phf::Map<&'static str, usize> = {};\n",
        index.build()
    )
    .unwrap();
}

fn write_registers(file: &mut impl Write, table: &toml::Table) {
    let entries = array_of_tables(table, "registers");
    let mut index = phf_codegen::Map::new();
    let mut literals = Vec::new();
    for (position, register) in entries.iter().enumerate() {
        let name = string_field(register, "name");
        let bits = register
            .get("bits")
            .and_then(|v| v.as_integer())
            .unwrap_or(8);
        literals.push(format!(
            "Register {{ name: \"{}\", description: \"{}\", bits: {} }}",
            escape_string(&name),
            escape_string(&string_field(register, "description")),
            bits,
        ));
        index.entry(name.to_ascii_uppercase(), &position.to_string());
    }

    writeln!(
        file,
        "/// CPU registers.\n\
         pub static REGISTERS: &[Register] = &[\n    {}\n];\n",
        literals.join(",\n    ")
    )
    .unwrap();
    writeln!(
        file,
        "/// Maps uppercase register names to their position in `REGISTERS`.\n\
         static REGISTER_INDEX: phf::Map<&'static str, usize> = {};\n",
        index.build()
    )
    .unwrap();
}

fn array_of_tables<'a>(table: &'a toml::Table, key: &str) -> Vec<&'a toml::Table> {
    table
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|item| item.as_table()).collect())
        .unwrap_or_default()
}

fn string_field(table: &toml::Table, key: &str) -> String {
    table
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn string_list(value: Option<&toml::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn literal_list(values: &[String]) -> String {
    values
        .iter()
        .map(|value| format!("\"{}\"", escape_string(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape special characters in a string for use in Rust string literals.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
