//! Append-only parse history.
//!
//! The history is a persistent, structurally shared list: appending returns a new
//! [`History`] that shares every older record with its parent. Keeping an older value
//! around is a snapshot and dropping a newer one is a rollback, both O(1). This is what
//! lets the choice driver discard a failed alternative without copying.

use crate::ast::Token;
use crate::directory::DirectoryTable;
use crate::encoding::Encoding;
use crate::value::Value;
use std::rc::Rc;
use std::sync::Arc;

/// Structural scope identifier handed out by a monotonically increasing counter.
pub type ScopeId = u32;

/// Where an entry's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A byte range actually returned by the byte source.
    Source,
    /// A value computed by an expression (`Let`).
    Constant,
}

/// The kind of token that produced an entry; used by exporters for labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Def,
    Greedy,
    Let,
    Directory,
}

impl EntryKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Def => "Def",
            EntryKind::Greedy => "Greedy",
            EntryKind::Let => "Let",
            EntryKind::Directory => "Directory",
        }
    }
}

/// One named value in the history. Immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub scope: ScopeId,
    pub name: String,
    pub offset: u64,
    pub length: u64,
    pub data: Vec<u8>,
    pub encoding: Encoding,
    pub origin: Origin,
    pub kind: EntryKind,
}

impl HistoryEntry {
    pub fn value(&self) -> Value {
        Value::bytes(self.data.clone(), self.encoding)
    }

    pub fn as_int(&self) -> Option<i128> {
        self.encoding.to_int(&self.data)
    }

    pub fn as_text(&self) -> String {
        self.encoding.to_text(&self.data)
    }
}

/// A history record: a value, the opening/closing of a structural group, or the typed
/// resource tree a directory token produced.
#[derive(Debug, Clone)]
pub enum Record {
    Value(HistoryEntry),
    Enter {
        scope: ScopeId,
        parent: ScopeId,
        token: Arc<Token>,
    },
    Leave {
        scope: ScopeId,
    },
    Directory(Rc<DirectoryTable>),
}

struct Node {
    record: Record,
    next: Option<Rc<Node>>,
}

/// Persistent history list; newest record first.
#[derive(Clone, Default)]
pub struct History {
    head: Option<Rc<Node>>,
    len: usize,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    #[must_use]
    pub fn push(&self, record: Record) -> History {
        History {
            head: Some(Rc::new(Node {
                record,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Number of records (values and group markers).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Records from newest to oldest.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.head.as_deref(),
        }
    }

    /// Value entries from newest to oldest.
    pub fn values(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.iter().filter_map(|r| match r {
            Record::Value(e) => Some(e),
            _ => None,
        })
    }

    /// Resource trees decoded so far, newest first.
    pub fn directories(&self) -> impl Iterator<Item = &DirectoryTable> {
        self.iter().filter_map(|r| match r {
            Record::Directory(t) => Some(t.as_ref()),
            _ => None,
        })
    }

    /// Records from oldest to newest.
    pub fn records(&self) -> Vec<&Record> {
        let mut out: Vec<&Record> = self.iter().collect();
        out.reverse();
        out
    }

    /// Value entries from oldest to newest.
    pub fn entries(&self) -> Vec<&HistoryEntry> {
        let mut out: Vec<&HistoryEntry> = self.values().collect();
        out.reverse();
        out
    }

    /// Most recently appended value entry.
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.values().next()
    }

    /// Most recent entry named `name`.
    pub fn last(&self, name: &str) -> Option<&HistoryEntry> {
        self.values().find(|e| e.name == name)
    }

    /// Most recent entry named `name` inside `scope`.
    pub fn last_in_scope(&self, name: &str, scope: ScopeId) -> Option<&HistoryEntry> {
        self.values().find(|e| e.scope == scope && e.name == name)
    }

    /// True when both values share the same newest node, i.e. one is an unmodified
    /// snapshot of the other.
    pub fn ptr_eq(&self, other: &History) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Drop for History {
    // Unlink iteratively; a long history would otherwise overflow the stack on drop.
    fn drop(&mut self) {
        let mut cur = self.head.take();
        while let Some(node) = cur {
            match Rc::try_unwrap(node) {
                Ok(mut n) => cur = n.next.take(),
                Err(_) => break,
            }
        }
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.records()).finish()
    }
}

pub struct Iter<'h> {
    next: Option<&'h Node>,
}

impl<'h> Iterator for Iter<'h> {
    type Item = &'h Record;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next.as_deref();
        Some(&node.record)
    }
}
