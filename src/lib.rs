//! # binmetal: declarative binary format decoding
//!
//! Formats are described as grammars of composable tokens and evaluated against a
//! random-access byte source. Decoding produces an append-only history of named values
//! that later tokens can refer back to (lengths, counts, offsets, predicates).
//!
//! ## Building blocks
//!
//! - **Fields**: `def` (sized, predicate-gated), `nod` (skip), `greedy` (length found by
//!   probing byte by byte), `let_` (computed value)
//! - **Structure**: `seq`, `cho` (ordered choice with backtracking), `rep` / `repn`,
//!   `pre` (conditional), `sub` (parse at an offset and return), `fix` / `self_ref`
//!   (recursion)
//! - **Expressions**: `last(name)`, `offset_of(name)`, arithmetic including exact
//!   `ceil_div` / `floor_div`, `if_else`; predicates `eq`, `eq_num`, `gt_num`,
//!   `masked_eq`, combined with `and` / `or` / `negate`
//! - **PE resources**: `resource_directory` decodes the recursive resource tree
//!
//! ## Example
//!
//! ```
//! use binmetal::ast::{def, def_if, def_sized, seq};
//! use binmetal::expr::{con_bytes, eq, last, Expr};
//! use binmetal::{Encoding, Format, SliceSource};
//!
//! let grammar = seq("record", vec![
//!     def_if("magic", 2, eq(con_bytes(b"BM"))),
//!     def("length", 1),
//!     def_sized("payload", last("length"), Expr::True),
//! ]);
//! let format = Format::new("record", grammar, Encoding::big_endian());
//! let data = [b'B', b'M', 3, 1, 2, 3];
//! let source = SliceSource::new(&data);
//! let env = format.decode(&source).unwrap();
//! assert_eq!(env.history().last("payload").unwrap().data, vec![1, 2, 3]);
//! ```
//!
//! Built-in grammars live in [`formats`]; [`export`] turns a history into hex viewer
//! markers, a JSON tree or a text dump.

pub mod ast;
pub mod backtrack;
pub mod decode;
pub mod directory;
pub mod encoding;
pub mod environment;
pub mod export;
pub mod expr;
pub mod formats;
pub mod greedy;
pub mod history;
pub mod numeric;
pub mod source;
pub mod value;

pub use ast::Token;
pub use decode::{decode, parse, DecodeOptions, Format, ParseError};
pub use directory::{DirectoryTable, EntryKey, EntryTarget, ResourceType};
pub use encoding::{Charset, Encoding, Endianness, Sign};
pub use environment::Environment;
pub use export::TreeOptions;
pub use history::{History, HistoryEntry, Origin};
pub use source::{ByteSource, FileSource, SliceSource};
pub use value::Value;
