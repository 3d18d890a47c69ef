//! VHDX block allocation table (BAT).
//!
//! Every BAT entry is a little-endian u64 laid out as `State:3 | Reserved:17 |
//! FileOffsetMB:44`. Payload entries are grouped in chunks of `chunk_ratio` entries, each
//! chunk followed by one sector bitmap entry:
//!
//! ```text
//! chunk_ratio            = 2^23 * LogicalSectorSize / BlockSize
//! data_blocks            = ceil(VirtualDiskSize / BlockSize)
//! sector_bitmap_blocks   = ceil(data_blocks / chunk_ratio)
//! total (dynamic)        = data_blocks + floor((data_blocks - 1) / chunk_ratio)
//! total (differencing)   = sector_bitmap_blocks * (chunk_ratio + 1)
//! ```
//!
//! The grammar reads the header values it needs from history: `LogicalSectorSize`,
//! `BlockSize`, `VirtualDiskSize` and `BatFileOffset` must have been appended by whatever
//! parsed the metadata region.

use crate::ast::{cho, def, def_if, nod, pre, repn, seq, seq_enc, sub, Token};
use crate::encoding::Encoding;
use crate::expr::{con, gt_num_of, last, masked_eq, ValueExpr};
use std::sync::Arc;

pub const LOGICAL_SECTOR_SIZE: &str = "LogicalSectorSize";
pub const BLOCK_SIZE: &str = "BlockSize";
pub const VIRTUAL_DISK_SIZE: &str = "VirtualDiskSize";
pub const BAT_FILE_OFFSET: &str = "BatFileOffset";

const UINT64: u64 = 8;
const STATE_MASK: u64 = 0x07;
const MB: i128 = 0x10_0000;

/// Payload block states.
pub const PAYLOAD_STATES: &[(&str, i128)] = &[
    ("payload_block_not_present", 0),
    ("payload_block_undefined", 1),
    ("payload_block_zero", 2),
    ("payload_block_unmapped", 3),
    ("payload_block_fully_present", 6),
    ("payload_block_partially_present", 7),
];

const FULLY_PRESENT: &str = "payload_block_fully_present";

fn state_entry(name: &str, state: i128) -> Arc<Token> {
    def_if(name, UINT64, masked_eq(STATE_MASK, state))
}

/// A fully present block, optionally with its first and last payload byte bracketed at
/// `FileOffsetMB * 1 MiB`.
fn fully_present(resolve: bool) -> Arc<Token> {
    let entry = state_entry(FULLY_PRESENT, 6);
    if !resolve {
        return entry;
    }
    let payload = seq(
        "payload_block",
        vec![
            def("payload_block_start", 1),
            nod(last(BLOCK_SIZE) - con(2)),
            def("payload_block_end", 1),
        ],
    );
    seq(
        FULLY_PRESENT,
        vec![entry, sub(payload, (last(FULLY_PRESENT) >> con(20)) * con(MB))],
    )
}

/// One payload BAT entry, classified by the low three bits.
pub fn bat_entry(resolve: bool) -> Arc<Token> {
    let alternatives = PAYLOAD_STATES
        .iter()
        .map(|&(name, state)| {
            if name == FULLY_PRESENT {
                fully_present(resolve)
            } else {
                state_entry(name, state)
            }
        })
        .collect();
    cho("bat_entry", alternatives)
}

/// Sector bitmap entry following each chunk.
pub fn sector_bitmap() -> Arc<Token> {
    cho(
        "sector_bitmap",
        vec![
            state_entry("sector_bitmap_block_not_present", 0),
            state_entry("sector_bitmap_block_present", 6),
        ],
    )
}

pub fn chunk_ratio() -> ValueExpr {
    (con(1 << 23) * last(LOGICAL_SECTOR_SIZE)) / last(BLOCK_SIZE)
}

pub fn data_blocks_count() -> ValueExpr {
    last(VIRTUAL_DISK_SIZE).ceil_div(last(BLOCK_SIZE))
}

pub fn sector_bitmap_blocks_count() -> ValueExpr {
    data_blocks_count().ceil_div(chunk_ratio())
}

pub fn total_bat_entries_dynamic() -> ValueExpr {
    data_blocks_count() + (data_blocks_count() - con(1)).floor_div(chunk_ratio())
}

pub fn total_bat_entries_differencing() -> ValueExpr {
    sector_bitmap_blocks_count() * (chunk_ratio() + con(1))
}

/// The whole BAT at `BatFileOffset`. With more entries than one chunk holds, entries come
/// in groups of `chunk_ratio` payload entries plus a sector bitmap, followed by the
/// remaining payload entries; otherwise the table is payload entries only.
pub fn bat(resolve: bool) -> Arc<Token> {
    let group = chunk_ratio() + con(1);
    let chunked = seq(
        "chunks",
        vec![
            repn(
                "chunk",
                seq(
                    "chunk_entries",
                    vec![repn("entries", bat_entry(resolve), chunk_ratio()), sector_bitmap()],
                ),
                total_bat_entries_dynamic().floor_div(group.clone()),
            ),
            repn("entries", bat_entry(resolve), total_bat_entries_dynamic() % group),
        ],
    );
    let many = gt_num_of(total_bat_entries_dynamic(), chunk_ratio());
    let flat = repn("entries", bat_entry(resolve), total_bat_entries_dynamic());
    let table = seq_enc(
        "bat",
        Encoding::little_endian(),
        vec![pre(chunked, many.clone()), pre(flat, many.negate())],
    );
    sub(table, last(BAT_FILE_OFFSET))
}
