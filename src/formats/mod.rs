//! Built-in grammars.

pub mod eml;
pub mod pe;
pub mod vhdx;

use crate::decode::Format;

/// Names accepted by [`by_name`].
pub const NAMES: &[&str] = &["pe", "eml"];

/// Look up a complete, self-contained format by short name. The VHDX BAT is not listed:
/// it needs header values decoded elsewhere.
pub fn by_name(name: &str) -> Option<Format> {
    match name.to_ascii_lowercase().as_str() {
        "pe" | "exe" => Some(pe::format()),
        "eml" | "rfc822" => Some(eml::format()),
        _ => None,
    }
}
