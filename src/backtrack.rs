//! Backtracking drivers for ordered choice and repetition.
//!
//! Each attempt receives a clone of the environment it starts from; because the
//! environment is persistent, a failed attempt is discarded simply by dropping its
//! result. Nothing a failed alternative appended is visible to the next alternative or to
//! the caller.

use crate::decode::ParseError;
use crate::environment::Environment;
use log::trace;

/// Choice driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChoiceState {
    Trying(usize),
    Committed(usize),
    Failed,
}

/// Try `alternatives` in declaration order against identical copies of `env` and commit
/// the first that succeeds. Returns the index of the committed alternative.
pub fn first_match<'a, T, F>(
    name: &str,
    alternatives: &[T],
    env: &Environment<'a>,
    mut attempt: F,
) -> Result<(usize, Environment<'a>), ParseError>
where
    F: FnMut(&T, &Environment<'a>) -> Result<Environment<'a>, ParseError>,
{
    let mut state = ChoiceState::Trying(0);
    let mut committed = None;
    while let ChoiceState::Trying(i) = state {
        let Some(alt) = alternatives.get(i) else {
            state = ChoiceState::Failed;
            break;
        };
        state = match attempt(alt, env) {
            Ok(done) => {
                committed = Some(done);
                ChoiceState::Committed(i)
            }
            Err(e) => {
                trace!("{}: alternative {} failed at offset {}: {}", name, i, env.offset(), e);
                ChoiceState::Trying(i + 1)
            }
        };
    }
    match (state, committed) {
        (ChoiceState::Committed(i), Some(done)) => {
            trace!("{}: committed alternative {} at offset {}", name, i, env.offset());
            Ok((i, done))
        }
        _ => Err(ParseError::AllAlternativesFailed {
            name: name.to_string(),
            offset: env.offset(),
            tried: alternatives.len(),
        }),
    }
}

/// Repeat `step` until it fails, returning the environment of the last success.
///
/// The failing iteration is discarded. An iteration that succeeds without moving the
/// cursor is kept when it appended anything, then ends the repetition: running it again
/// would start from the same bytes. Reaching `limit` also ends it.
pub fn repeat_until_fail<'a, F>(env: &Environment<'a>, limit: u64, mut step: F) -> Environment<'a>
where
    F: FnMut(&Environment<'a>) -> Result<Environment<'a>, ParseError>,
{
    let mut cur = env.clone();
    let mut count = 0u64;
    while count < limit {
        match step(&cur) {
            Ok(next) if next.offset() != cur.offset() => {
                cur = next;
                count += 1;
            }
            Ok(next) => {
                trace!("repetition made no progress at offset {}, stopping", cur.offset());
                if !next.same_state(&cur) {
                    cur = next;
                }
                break;
            }
            Err(e) => {
                trace!("repetition stopped after {} iterations: {}", count, e);
                break;
            }
        }
    }
    cur
}

/// Repeat `step` exactly `count` times; any failing iteration fails the whole repetition.
pub fn repeat_n<'a, F>(env: &Environment<'a>, count: u64, mut step: F) -> Result<Environment<'a>, ParseError>
where
    F: FnMut(&Environment<'a>) -> Result<Environment<'a>, ParseError>,
{
    let mut cur = env.clone();
    for _ in 0..count {
        cur = step(&cur)?;
    }
    Ok(cur)
}
