//! Exporters for a completed parse history: flat row markers for a hex viewer, a nested
//! tree for a structure viewer, and a plain text dump.

use crate::ast::Token;
use crate::history::{EntryKind, History, HistoryEntry, Origin, Record};
use serde_json::{json, Map, Value as Json};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;

/// Bytes per hex viewer row.
pub const COLUMN_COUNT: u64 = 32;

/// One highlighted byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub offset: u64,
    pub length: u64,
    pub name: String,
}

impl Marker {
    fn from_entry(e: &HistoryEntry) -> Self {
        Marker {
            offset: e.offset,
            length: e.length,
            name: e.name.clone(),
        }
    }
}

/// Entries read from the byte source, keyed by row (`offset / 32`). Rows ascend; within a
/// row the most recently appended entry comes first.
pub fn flat_rows(history: &History) -> BTreeMap<u64, Vec<Marker>> {
    let mut rows: BTreeMap<u64, Vec<Marker>> = BTreeMap::new();
    for e in history.values().filter(|e| e.origin == Origin::Source) {
        rows.entry(e.offset / COLUMN_COUNT)
            .or_default()
            .push(Marker::from_entry(e));
    }
    rows
}

/// Hex viewer data script: row count, populated rows and their markers.
pub fn flat_js(history: &History) -> String {
    let rows = flat_rows(history);
    let locations: Vec<String> = rows.keys().map(|r| r.to_string()).collect();
    let data: Vec<String> = rows
        .values()
        .map(|markers| {
            let items: Vec<String> = markers
                .iter()
                .map(|m| format!("[{}, {}, '{}']", m.offset, m.length, js_escape(&m.name)))
                .collect();
            format!("[{}]", items.join(", "))
        })
        .collect();
    format!(
        "/* generated by binmetal */var columnCountUpdate = {};var locationsUpdate = [{}];var dataUpdate = [{}];",
        COLUMN_COUNT,
        locations.join(", "),
        data.join(",")
    )
}

fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    /// Group nodes produced by the same grammar token share one children list across the
    /// whole tree: later occurrences append their children to the first occurrence and are
    /// rendered without children of their own. With `false` every group keeps its own list.
    pub share_children_by_definition: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        TreeOptions {
            share_children_by_definition: true,
        }
    }
}

enum Item {
    Leaf(String),
    /// Group label and the children list it renders, if it owns one.
    Group(String, Option<usize>),
}

fn label(kind: &str, name: &str) -> String {
    if name.is_empty() {
        kind.to_string()
    } else {
        format!("{kind}: {name}")
    }
}

/// Nested `{"name", "children"}` view of the history's first top-level item, or `{}` for
/// an empty history.
///
/// Children lists live in an arena. A list is only ever referenced by the group that
/// created it, and that group sits in a list created earlier, so rendering terminates.
pub fn tree_json(history: &History, opts: &TreeOptions) -> Json {
    let mut lists: Vec<Vec<Item>> = vec![Vec::new()];
    let mut by_token: HashMap<*const Token, usize> = HashMap::new();
    // List each open group appends to; index 0 is the top level.
    let mut stack: Vec<usize> = vec![0];

    for record in history.records() {
        let target = stack.last().copied().unwrap_or(0);
        match record {
            Record::Value(e) => {
                lists[target].push(Item::Leaf(label(e.kind.label(), &e.name)));
            }
            Record::Enter { token, .. } => {
                let name = label(token.label(), &token.name);
                let key = Arc::as_ptr(token);
                let shared = opts
                    .share_children_by_definition
                    .then(|| by_token.get(&key).copied())
                    .flatten();
                let list = match shared {
                    Some(existing) => {
                        lists[target].push(Item::Group(name, None));
                        existing
                    }
                    None => {
                        lists.push(Vec::new());
                        let id = lists.len() - 1;
                        by_token.entry(key).or_insert(id);
                        lists[target].push(Item::Group(name, Some(id)));
                        id
                    }
                };
                stack.push(list);
            }
            Record::Leave { .. } => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Record::Directory(_) => {}
        }
    }

    match lists[0].first() {
        Some(item) => render(item, &lists),
        None => json!({}),
    }
}

fn render(item: &Item, lists: &[Vec<Item>]) -> Json {
    let mut node = Map::new();
    match item {
        Item::Leaf(name) => {
            node.insert("name".to_string(), Json::String(name.clone()));
        }
        Item::Group(name, list) => {
            node.insert("name".to_string(), Json::String(name.clone()));
            if let Some(id) = list {
                let children = lists[*id].iter().map(|c| render(c, lists)).collect();
                node.insert("children".to_string(), Json::Array(children));
            }
        }
    }
    Json::Object(node)
}

/// One line per history record, indented by group nesting.
pub fn dump(history: &History) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for record in history.records() {
        match record {
            Record::Value(e) => {
                let _ = writeln!(
                    out,
                    "{:>10} {:>8}  {}{} = {}",
                    e.offset,
                    e.length,
                    "  ".repeat(depth),
                    e.name,
                    render_value(e)
                );
            }
            Record::Enter { token, .. } => {
                let name = label(token.label(), &token.name);
                let _ = writeln!(out, "{:>10} {:>8}  {}[{}]", "", "", "  ".repeat(depth), name);
                depth += 1;
            }
            Record::Leave { .. } => depth = depth.saturating_sub(1),
            Record::Directory(_) => {}
        }
    }
    out
}

fn render_value(e: &HistoryEntry) -> String {
    if e.kind == EntryKind::Let {
        return e.as_int().map(|v| v.to_string()).unwrap_or_else(|| e.as_text());
    }
    if e.data.is_empty() {
        return "(empty)".to_string();
    }
    if e.data.len() <= 8 {
        if let Some(v) = e.as_int() {
            return format!("{v} ({v:#x})");
        }
    }
    let text = e.as_text();
    if !text.is_empty() && text.chars().all(|c| !c.is_control() || c == '\t') {
        return format!("{text:?}");
    }
    let shown: Vec<String> = e.data.iter().take(16).map(|b| format!("{b:02x}")).collect();
    let more = if e.data.len() > 16 { " .." } else { "" };
    format!("{}{}", shown.join(" "), more)
}
