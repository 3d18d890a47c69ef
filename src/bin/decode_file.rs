//! Decode a file with a built-in format and print the result.
//!
//! Usage:
//!   decode_file FORMAT FILE [--dump | --flat | --tree | --resources]
//!
//! FORMAT is one of `pe`, `eml`. Output defaults to `--dump`.
//!
//! Options:
//!   --dump        One line per decoded value, indented by structure
//!   --flat        Hex viewer marker script (32-byte rows)
//!   --tree        JSON structure tree
//!   --resources   PE only: resource tree with resolved payload offsets

use anyhow::{bail, Context};
use binmetal::directory::{language_name, DirectoryTable, EntryKey, EntryTarget};
use binmetal::export::{dump, flat_js, tree_json};
use binmetal::{formats, Environment, FileSource, TreeOptions};
use std::path::Path;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Output {
    Dump,
    Flat,
    Tree,
    Resources,
}

fn usage() -> String {
    format!(
        "usage: decode_file FORMAT FILE [--dump | --flat | --tree | --resources]\nformats: {}",
        formats::NAMES.join(", ")
    )
}

fn print_table(table: &DirectoryTable, indent: usize) {
    for entry in &table.entries {
        let key = match &entry.key {
            EntryKey::Name(n) => format!("\"{}\"", n),
            EntryKey::Type(t) => t.name().to_string(),
            EntryKey::Id(id) => format!("#{}", id),
            EntryKey::Language(id) => language_name(*id)
                .map(str::to_string)
                .unwrap_or_else(|| format!("lang {:#06x}", id)),
        };
        match &entry.target {
            EntryTarget::Directory(sub) => {
                println!("{}{}", "  ".repeat(indent), key);
                print_table(sub, indent + 1);
            }
            EntryTarget::Data(d) => println!(
                "{}{}: {} bytes at {:#x} (rva {:#x}, code page {})",
                "  ".repeat(indent),
                key,
                d.size,
                d.file_offset,
                d.rva,
                d.code_page
            ),
        }
    }
}

fn print_resources(env: &Environment<'_>) -> anyhow::Result<()> {
    let tables: Vec<&DirectoryTable> = env.history().directories().collect();
    if tables.is_empty() {
        bail!("no resource section found");
    }
    // oldest section first
    for table in tables.into_iter().rev() {
        println!("resource directory at {:#x}", table.offset);
        print_table(table, 1);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mut output = Output::Dump;
    let flags = [
        ("--dump", Output::Dump),
        ("--flat", Output::Flat),
        ("--tree", Output::Tree),
        ("--resources", Output::Resources),
    ];
    for (flag, kind) in flags {
        if let Some(pos) = args.iter().position(|a| a == flag) {
            args.remove(pos);
            output = kind;
        }
    }
    if args.len() != 2 {
        bail!(usage());
    }
    let format = formats::by_name(&args[0]).with_context(|| format!("unknown format {:?}\n{}", args[0], usage()))?;
    let path = Path::new(&args[1]);
    let source = FileSource::open(path).with_context(|| format!("{}: cannot open", path.display()))?;

    let env = format
        .decode(&source)
        .with_context(|| format!("{}: not a valid {} file", path.display(), format.name))?;

    match output {
        Output::Dump => print!("{}", dump(env.history())),
        Output::Flat => println!("{}", flat_js(env.history())),
        Output::Tree => println!(
            "{}",
            serde_json::to_string_pretty(&tree_json(env.history(), &TreeOptions::default()))?
        ),
        Output::Resources => print_resources(&env)?,
    }
    Ok(())
}
