//! Recursive decoder for the PE resource directory tree.
//!
//! The `.rsrc` section starts with a directory table. Each table holds named entries
//! followed by id entries; every entry ends in a 32-bit offset whose high bit says whether
//! it points to another table (bit set) or to a leaf data descriptor (bit clear). Both are
//! relative to the tree root. What an id entry's key means depends on how deep the table
//! is:
//!
//! | Depth | Key |
//! |-------|-----|
//! | 1 (root) | resource type (`ICON`, `VERSION`, ... or a raw `ID`) |
//! | 2 | resource name/id |
//! | 3 | language id |
//!
//! Depth is passed down explicitly. Every table and entry opens its own scope in the
//! history, so field names of nested tables never collide with their ancestors'. Each
//! table is decoded at most once per tree root: an offset that points back at a table
//! already decoded (an ancestor or a sibling's subtree) is rejected, so neither a cycle
//! nor a fan-in of shared subtables can make the walk outgrow its input.

use crate::ast::{Token, TokenKind};
use crate::decode::{DecodeOptions, ParseError};
use crate::encoding::Encoding;
use crate::environment::Environment;
use crate::expr::ValueExpr;
use crate::history::EntryKind;
use log::{debug, trace};
use std::collections::HashSet;
use std::sync::Arc;

/// Tag bit of an entry offset: set for subdirectories, clear for data descriptors.
pub const HIGH_BIT: u32 = 0x8000_0000;

/// Deepest table the format defines (type / name / language).
pub const MAX_DEPTH: usize = 3;

/// Zero-length marker entry recording the tree root's offset.
pub const ROOT_MARKER: &str = "ResourceDirectoryRoot";

const ENTRY_SIZE: u64 = 8;

const LE: Encoding = Encoding::little_endian();

/// Group tokens for the structures of one resource directory, plus the delta expression.
/// Built once with the grammar so every decode reuses the same token identities.
#[derive(Debug)]
pub struct DirectoryShape {
    pub delta: ValueExpr,
    table: Arc<Token>,
    named_entry: Arc<Token>,
    id_entry: Arc<Token>,
    name_string: Arc<Token>,
    data: Arc<Token>,
}

impl DirectoryShape {
    pub fn new(delta: ValueExpr) -> Self {
        let group = |name: &str| Token::new(name, TokenKind::Seq(Vec::new()));
        DirectoryShape {
            delta,
            table: group("dir"),
            named_entry: group("name"),
            id_entry: group("id"),
            name_string: group("ResourceDirectoryString"),
            data: group("data"),
        }
    }
}

/// Predefined resource types (root-level keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Cursor = 1,
    Bitmap = 2,
    Icon = 3,
    Menu = 4,
    Dialog = 5,
    String = 6,
    FontDir = 7,
    Font = 8,
    Accelerators = 9,
    RcData = 10,
    MessageTable = 11,
    GroupCursor = 12,
    GroupIcon = 14,
    Version = 16,
    DlgInclude = 17,
    PlugPlay = 19,
    Vxd = 20,
    AniCursor = 21,
    AniIcon = 22,
    Html = 23,
    Manifest = 24,
}

impl ResourceType {
    pub fn from_id(id: u32) -> Option<Self> {
        use ResourceType::*;
        Some(match id {
            1 => Cursor,
            2 => Bitmap,
            3 => Icon,
            4 => Menu,
            5 => Dialog,
            6 => String,
            7 => FontDir,
            8 => Font,
            9 => Accelerators,
            10 => RcData,
            11 => MessageTable,
            12 => GroupCursor,
            14 => GroupIcon,
            16 => Version,
            17 => DlgInclude,
            19 => PlugPlay,
            20 => Vxd,
            21 => AniCursor,
            22 => AniIcon,
            23 => Html,
            24 => Manifest,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        use ResourceType::*;
        match self {
            Cursor => "CURSOR",
            Bitmap => "BITMAP",
            Icon => "ICON",
            Menu => "MENU",
            Dialog => "DIALOG",
            String => "STRING",
            FontDir => "FONTDIR",
            Font => "FONT",
            Accelerators => "ACCELERATORS",
            RcData => "RCDATA",
            MessageTable => "MESSAGETABLE",
            GroupCursor => "GROUP_CURSOR",
            GroupIcon => "GROUP_ICON",
            Version => "VERSION",
            DlgInclude => "DLGINCLUDE",
            PlugPlay => "PLUGPLAY",
            Vxd => "VXD",
            AniCursor => "ANICURSOR",
            AniIcon => "ANIICON",
            Html => "HTML",
            Manifest => "MANIFEST",
        }
    }
}

/// Culture tag for common Windows language ids (low 16 bits of a depth-3 key).
pub fn language_name(id: u32) -> Option<&'static str> {
    Some(match id & 0xffff {
        0x0000 => "LANG_NEUTRAL",
        0x0400 => "LANG_USER_DEFAULT",
        0x0404 => "zh-TW",
        0x0407 => "de-DE",
        0x0409 => "en-US",
        0x040c => "fr-FR",
        0x0410 => "it-IT",
        0x0411 => "ja-JP",
        0x0412 => "ko-KR",
        0x0413 => "nl-NL",
        0x0415 => "pl-PL",
        0x0416 => "pt-BR",
        0x0419 => "ru-RU",
        0x041d => "sv-SE",
        0x0804 => "zh-CN",
        0x0809 => "en-GB",
        0x0816 => "pt-PT",
        0x0c0a => "es-ES",
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryTable {
    pub offset: u64,
    pub depth: usize,
    pub characteristics: u32,
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub entries: Vec<DirectoryEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub key: EntryKey,
    pub target: EntryTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKey {
    /// Named entry (string from the resource string table).
    Name(String),
    /// Depth 1 key found in the type enumeration.
    Type(ResourceType),
    /// Raw numeric id (unknown type at depth 1, any key at depth 2).
    Id(u32),
    Language(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryTarget {
    Directory(DirectoryTable),
    Data(DataDescriptor),
}

/// Leaf record: `rva, size, code page, reserved`, plus the resolved payload offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    pub offset: u64,
    pub rva: u32,
    pub size: u32,
    pub code_page: u32,
    /// `rva - delta`: where the payload lives in the file.
    pub file_offset: u64,
}

impl DirectoryTable {
    /// All leaf descriptors, depth first.
    pub fn leaves(&self) -> Vec<&DataDescriptor> {
        let mut out = Vec::new();
        for e in &self.entries {
            match &e.target {
                EntryTarget::Directory(t) => out.extend(t.leaves()),
                EntryTarget::Data(d) => out.push(d),
            }
        }
        out
    }
}

/// Decode the resource tree rooted at the cursor. Returns the environment positioned
/// after the root table and the typed tree.
pub fn decode_tree<'a>(
    shape: &DirectoryShape,
    env: &Environment<'a>,
    opts: &DecodeOptions,
) -> Result<(Environment<'a>, DirectoryTable), ParseError> {
    let root = env.offset();
    let env = env.read_value(ROOT_MARKER, 0, LE, EntryKind::Directory)?;
    let mut walker = Walker {
        shape,
        opts,
        root,
        path: Vec::new(),
        visited: HashSet::new(),
    };
    walker.table(&env, root, 1)
}

struct Walker<'s> {
    shape: &'s DirectoryShape,
    opts: &'s DecodeOptions,
    root: u64,
    /// Offsets of the tables currently being decoded, outermost first.
    path: Vec<u64>,
    /// Every table offset decoded under this root.
    visited: HashSet<u64>,
}

fn read_u16<'a>(env: &Environment<'a>, name: &str) -> Result<(Environment<'a>, u16), ParseError> {
    let next = env.read_value(name, 2, LE, EntryKind::Directory)?;
    let v = next
        .history()
        .current()
        .and_then(|e| e.as_int())
        .and_then(|v| u16::try_from(v).ok())
        .unwrap_or(0);
    Ok((next, v))
}

fn read_u32<'a>(env: &Environment<'a>, name: &str) -> Result<(Environment<'a>, u32), ParseError> {
    let next = env.read_value(name, 4, LE, EntryKind::Directory)?;
    let v = next
        .history()
        .current()
        .and_then(|e| e.as_int())
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);
    Ok((next, v))
}

impl Walker<'_> {
    fn resolve(&self, relative: u32) -> u64 {
        self.root + u64::from(relative & !HIGH_BIT)
    }

    fn table<'a>(
        &mut self,
        env: &Environment<'a>,
        at: u64,
        depth: usize,
    ) -> Result<(Environment<'a>, DirectoryTable), ParseError> {
        if depth > MAX_DEPTH {
            return Err(ParseError::DepthUndefined { depth, offset: at });
        }
        if self.path.contains(&at) {
            return Err(ParseError::RecursionLimitExceeded(format!(
                "directory table at offset {} is its own ancestor (root {})",
                at, self.root
            )));
        }
        if self.visited.contains(&at) {
            return Err(ParseError::RecursionLimitExceeded(format!(
                "directory table at offset {} was already decoded (root {})",
                at, self.root
            )));
        }
        if env.depth() >= self.opts.max_recursion {
            return Err(ParseError::RecursionLimitExceeded(format!(
                "{} groups open at directory table {}",
                env.depth(),
                at
            )));
        }
        debug!("resource directory table at offset {} (depth {})", at, depth);

        self.visited.insert(at);
        self.path.push(at);
        let result = self.table_body(env, at, depth);
        self.path.pop();
        result
    }

    fn table_body<'a>(
        &mut self,
        env: &Environment<'a>,
        at: u64,
        depth: usize,
    ) -> Result<(Environment<'a>, DirectoryTable), ParseError> {
        let cur = env.seek(at).enter(&self.shape.table);
        let (cur, characteristics) = read_u32(&cur, "Characteristics")?;
        let (cur, time_date_stamp) = read_u32(&cur, "TimeDateStamp")?;
        let (cur, major_version) = read_u16(&cur, "MajorVersion")?;
        let (cur, minor_version) = read_u16(&cur, "MinorVersion")?;
        let (cur, named) = read_u16(&cur, "NumberOfNamedEntries")?;
        let (mut cur, ids) = read_u16(&cur, "NumberOfIdEntries")?;

        let count = u64::from(named) + u64::from(ids);
        if count > self.opts.max_repetitions {
            return Err(ParseError::RepetitionLimitExceeded {
                name: "resource directory entries".to_string(),
                count,
                limit: self.opts.max_repetitions,
            });
        }
        let needed = count * ENTRY_SIZE;
        let available = cur.source().size().saturating_sub(cur.offset());
        if needed > available {
            return Err(ParseError::InsufficientData {
                offset: cur.offset(),
                requested: needed,
                available,
            });
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..named {
            let e = cur.enter(&self.shape.named_entry);
            let (e, pointer) = read_u32(&e, "NamePointer")?;
            let (e, name) = self.name_string(&e, pointer)?;
            let (e, target) = self.entry_body(&e, depth)?;
            cur = e.leave();
            entries.push(DirectoryEntry {
                key: EntryKey::Name(name),
                target,
            });
        }
        for _ in 0..ids {
            let e = cur.enter(&self.shape.id_entry);
            let (e, key) = self.id_key(&e, depth)?;
            let (e, target) = self.entry_body(&e, depth)?;
            cur = e.leave();
            entries.push(DirectoryEntry { key, target });
        }

        let table = DirectoryTable {
            offset: at,
            depth,
            characteristics,
            time_date_stamp,
            major_version,
            minor_version,
            entries,
        };
        Ok((cur.leave(), table))
    }

    /// Read an id entry's key; its meaning depends on the table depth.
    fn id_key<'a>(&self, env: &Environment<'a>, depth: usize) -> Result<(Environment<'a>, EntryKey), ParseError> {
        let raw = env.slice(4)?;
        let id = LE.to_int(&raw).and_then(|v| u32::try_from(v).ok()).unwrap_or(0);
        let (name, key) = match depth {
            1 => match ResourceType::from_id(id) {
                Some(t) => (t.name(), EntryKey::Type(t)),
                None => ("ID", EntryKey::Id(id)),
            },
            2 => ("ID", EntryKey::Id(id)),
            3 => (language_name(id).unwrap_or("LanguageId"), EntryKey::Language(id)),
            _ => {
                return Err(ParseError::DepthUndefined {
                    depth,
                    offset: env.offset(),
                })
            }
        };
        trace!("depth {} key {:#x} -> {}", depth, id, name);
        let next = env.read_value(name, 4, LE, EntryKind::Directory)?;
        Ok((next, key))
    }

    /// Length-prefixed UTF-16LE string at `root + (pointer & !HIGH_BIT)`; the cursor
    /// returns to where it was.
    fn name_string<'a>(&self, env: &Environment<'a>, pointer: u32) -> Result<(Environment<'a>, String), ParseError> {
        let s = env.enter(&self.shape.name_string).seek(self.resolve(pointer));
        let (s, units) = read_u16(&s, "length")?;
        let s = s.read_value("name", u64::from(units) * 2, Encoding::utf16_le(), EntryKind::Directory)?;
        let name = s.history().current().map(|e| e.as_text()).unwrap_or_default();
        Ok((s.leave().seek(env.offset()), name))
    }

    fn entry_body<'a>(
        &mut self,
        env: &Environment<'a>,
        depth: usize,
    ) -> Result<(Environment<'a>, EntryTarget), ParseError> {
        let (cur, offset) = read_u32(env, "DataEntryOffset")?;
        if offset & HIGH_BIT != 0 {
            let (done, table) = self.table(&cur, self.resolve(offset), depth + 1)?;
            return Ok((done.seek(cur.offset()), EntryTarget::Directory(table)));
        }
        let at = self.resolve(offset);
        let d = cur.enter(&self.shape.data).seek(at);
        let (d, rva) = read_u32(&d, "DataRva")?;
        let (d, size) = read_u32(&d, "Size")?;
        let (d, code_page) = read_u32(&d, "CodePage")?;
        let reserved_at = d.offset();
        let (d, reserved) = read_u32(&d, "Reserved")?;
        if reserved != 0 {
            return Err(ParseError::PredicateMismatch {
                name: "Reserved".to_string(),
                offset: reserved_at,
            });
        }
        let delta = self
            .shape
            .delta
            .eval_int(&d, &LE)
            .ok_or_else(|| ParseError::ExpressionInapplicable("resource section delta".to_string()))?;
        let file_offset = i128::from(rva)
            .checked_sub(delta)
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| {
                ParseError::ExpressionInapplicable(format!("payload offset {rva:#x} - {delta:#x} is negative"))
            })?;
        let d = d.seek(file_offset).read_value("data", u64::from(size), LE, EntryKind::Directory)?;
        let descriptor = DataDescriptor {
            offset: at,
            rva,
            size,
            code_page,
            file_offset,
        };
        Ok((d.leave().seek(cur.offset()), EntryTarget::Data(descriptor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::con;
    use crate::source::SliceSource;

    #[test]
    fn test_failed_table_leaves_path_empty() {
        // one id entry announced, none present
        let mut data = [0u8; 16];
        data[14] = 1;
        let src = SliceSource::new(&data);
        let env = Environment::new(&src);
        let shape = DirectoryShape::new(con(0));
        let opts = DecodeOptions::default();
        let mut walker = Walker {
            shape: &shape,
            opts: &opts,
            root: 0,
            path: Vec::new(),
            visited: HashSet::new(),
        };
        let err = walker.table(&env, 0, 1).unwrap_err();
        assert!(matches!(err, ParseError::InsufficientData { .. }));
        assert!(walker.path.is_empty());
        assert!(walker.visited.contains(&0));
    }
}
