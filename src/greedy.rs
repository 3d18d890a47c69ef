//! Greedy longest-run field reader.
//!
//! Some fields declare no length: an RFC 822 header name simply runs until the first byte
//! that may not appear in a name. The reader discovers the length by probing one byte at a
//! time: each probe is appended as a candidate entry and the predicate is evaluated against
//! that updated environment (so the predicate sees the probe as its current value). The
//! first failing probe, or the end of the source, ends the field; that probe is backed out
//! and the accepted bytes are re-read as one entry.

use crate::decode::ParseError;
use crate::encoding::Encoding;
use crate::environment::Environment;
use crate::expr::Expr;
use crate::history::EntryKind;
use log::trace;

/// Number of bytes from the cursor that satisfy `predicate`, probing one byte at a time.
pub fn greedy_length(name: &str, predicate: &Expr, env: &Environment<'_>, enc: &Encoding) -> u64 {
    let mut probe = env.clone();
    let mut accepted = 0u64;
    loop {
        let Ok(next) = probe.read_value(name, 1, *enc, EntryKind::Greedy) else {
            trace!("{}: source exhausted after {} bytes", name, accepted);
            break;
        };
        if !predicate.eval(&next, enc) {
            trace!("{}: terminated at offset {} after {} bytes", name, probe.offset(), accepted);
            break;
        }
        accepted += 1;
        probe = next;
    }
    accepted
}

/// Read a greedy field named `name` at the cursor.
pub fn read_greedy<'a>(
    name: &str,
    predicate: &Expr,
    env: &Environment<'a>,
    enc: &Encoding,
) -> Result<Environment<'a>, ParseError> {
    let length = greedy_length(name, predicate, env, enc);
    env.read_value(name, length, *enc, EntryKind::Greedy)
}
