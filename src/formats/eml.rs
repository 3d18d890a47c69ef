//! RFC 822 message headers (`message/rfc822`).
//!
//! A header block is a run of `name: value CRLF` fields closed by an empty line. Neither
//! names nor values carry a length, so both are greedy fields: the name runs while bytes
//! are printable and not `:`, the value while bytes are printable (Latin-1 range).

use crate::ast::{def_if, greedy, rep, seq, seq_enc, Token};
use crate::decode::Format;
use crate::encoding::Encoding;
use crate::expr::{con, con_bytes, eq, gt_num, lt_num, Expr};
use std::sync::Arc;

/// Bytes allowed in a field name: `33..=57` and `59..=126` (printable, no space or colon).
pub fn field_name_byte() -> Expr {
    gt_num(con(32))
        .and(lt_num(con(58)))
        .or(gt_num(con(58)).and(lt_num(con(127))))
}

/// Bytes allowed in a field value: `32..=165`.
pub fn value_byte() -> Expr {
    gt_num(con(31)).and(lt_num(con(166)))
}

fn crlf() -> Arc<Token> {
    def_if("crlf", 2, eq(con_bytes(b"\r\n")))
}

pub fn field() -> Arc<Token> {
    seq(
        "field",
        vec![
            greedy("name", field_name_byte()),
            def_if("separator", 2, eq(con_bytes(b": "))),
            greedy("value", value_byte()),
            crlf(),
        ],
    )
}

pub fn token() -> Arc<Token> {
    seq_enc(
        "message/rfc822",
        Encoding::little_endian(),
        vec![rep("fields", field()), crlf()],
    )
}

pub fn format() -> Format {
    Format::new("eml", token(), Encoding::little_endian())
}
