//! Parse environment: cursor, history and the stack of open groups.
//!
//! Every operation returns a new [`Environment`]; the receiver is never changed. A clone
//! is O(1) (the history is persistent), so the choice driver simply keeps the caller's
//! value and hands clones to each alternative.

use crate::ast::Token;
use crate::decode::ParseError;
use crate::directory::DirectoryTable;
use crate::encoding::Encoding;
use crate::history::{EntryKind, History, HistoryEntry, Origin, Record, ScopeId};
use crate::source::ByteSource;
use std::rc::Rc;
use std::sync::Arc;

/// Scope of entries appended outside any group.
pub const ROOT_SCOPE: ScopeId = 0;

/// An open group on the current path from the root.
#[derive(Debug)]
pub struct Frame {
    pub scope: ScopeId,
    pub token: Arc<Token>,
    pub depth: usize,
    parent: Option<Rc<Frame>>,
}

#[derive(Clone)]
pub struct Environment<'a> {
    source: &'a dyn ByteSource,
    offset: u64,
    history: History,
    frame: Option<Rc<Frame>>,
    next_scope: ScopeId,
}

impl<'a> Environment<'a> {
    pub fn new(source: &'a dyn ByteSource) -> Self {
        Environment {
            source,
            offset: 0,
            history: History::new(),
            frame: None,
            next_scope: ROOT_SCOPE + 1,
        }
    }

    pub fn source(&self) -> &'a dyn ByteSource {
        self.source
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Scope new entries are appended to.
    pub fn scope(&self) -> ScopeId {
        self.frame.as_ref().map(|f| f.scope).unwrap_or(ROOT_SCOPE)
    }

    /// Number of open groups.
    pub fn depth(&self) -> usize {
        self.frame.as_ref().map(|f| f.depth).unwrap_or(0)
    }

    /// Innermost open group.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_deref()
    }

    /// Open groups from innermost to outermost.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.frame.as_deref(), |f| f.parent.as_deref())
    }

    /// How many open groups were produced by a token named `name`.
    pub fn nesting(&self, name: &str) -> usize {
        self.frames().filter(|f| f.token.name == name).count()
    }

    #[must_use]
    pub fn seek(&self, offset: u64) -> Self {
        Environment {
            offset,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn add(&self, entry: HistoryEntry) -> Self {
        Environment {
            history: self.history.push(Record::Value(entry)),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn add_directory(&self, table: DirectoryTable) -> Self {
        Environment {
            history: self.history.push(Record::Directory(Rc::new(table))),
            ..self.clone()
        }
    }

    /// Open a group for `token` with a fresh scope id.
    #[must_use]
    pub fn enter(&self, token: &Arc<Token>) -> Self {
        let scope = self.next_scope;
        let parent = self.scope();
        let frame = Rc::new(Frame {
            scope,
            token: Arc::clone(token),
            depth: self.depth() + 1,
            parent: self.frame.clone(),
        });
        Environment {
            source: self.source,
            offset: self.offset,
            history: self.history.push(Record::Enter {
                scope,
                parent,
                token: Arc::clone(token),
            }),
            frame: Some(frame),
            next_scope: scope.wrapping_add(1),
        }
    }

    /// Close the innermost group. Closing at the root is a no-op.
    #[must_use]
    pub fn leave(&self) -> Self {
        let Some(frame) = self.frame.as_ref() else {
            return self.clone();
        };
        Environment {
            history: self.history.push(Record::Leave { scope: frame.scope }),
            frame: frame.parent.clone(),
            ..self.clone()
        }
    }

    /// Read `length` bytes at the cursor without moving it.
    pub fn slice(&self, length: u64) -> Result<Vec<u8>, ParseError> {
        self.source.read(self.offset, length)
    }

    /// Read `length` bytes at the cursor, append them as `name` and advance.
    pub fn read_value(
        &self,
        name: &str,
        length: u64,
        encoding: Encoding,
        kind: EntryKind,
    ) -> Result<Self, ParseError> {
        let data = self.slice(length)?;
        let entry = HistoryEntry {
            scope: self.scope(),
            name: name.to_string(),
            offset: self.offset,
            length,
            data,
            encoding,
            origin: Origin::Source,
            kind,
        };
        Ok(self.add(entry).seek(self.offset + length))
    }

    /// Append a computed constant without touching the cursor.
    #[must_use]
    pub fn add_constant(&self, name: &str, data: Vec<u8>, encoding: Encoding) -> Self {
        let entry = HistoryEntry {
            scope: self.scope(),
            name: name.to_string(),
            offset: self.offset,
            length: data.len() as u64,
            data,
            encoding,
            origin: Origin::Constant,
            kind: EntryKind::Let,
        };
        self.add(entry)
    }

    /// True when `other` holds the same history and cursor, i.e. nothing was appended.
    pub fn same_state(&self, other: &Environment<'_>) -> bool {
        self.offset == other.offset && self.history.ptr_eq(&other.history)
    }
}

impl std::fmt::Debug for Environment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("offset", &self.offset)
            .field("scope", &self.scope())
            .field("records", &self.history.len())
            .finish()
    }
}
