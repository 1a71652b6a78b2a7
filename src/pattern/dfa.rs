//! DFA fast path for time-free patterns.
//!
//! Runs the compiled DFA over the sorted event sequence in a single pass,
//! tracking the set of active states with two bitvectors. O(m·n) time and
//! O(m) space for m states and n events; since patterns are small, this is
//! effectively linear in the input.

use crate::common::event::Event;
use crate::common::timestamp::Timestamp;
use crate::error::{Error, Result};
use crate::pattern::parser::{CompiledPattern, DfaTransition};

/// Decides whether `pattern` matches anywhere in `events`.
///
/// Only valid for patterns without temporal assertions; the DFA has no way
/// to represent an anchor timestamp. Calling it on a temporal pattern is a
/// logic error.
pub fn dfa_match<T: Timestamp>(pattern: &CompiledPattern, events: &[Event<T>]) -> Result<bool> {
    if pattern.has_time() {
        return Err(Error::Logical(
            "DFA matching requested for a pattern with temporal assertions",
        ));
    }

    let states = pattern.dfa_states();
    let mut active = vec![false; states.len()];
    let mut next = vec![false; states.len()];
    active[0] = true;

    // Dead-end counter: once no state is active, no later event can revive
    // the match and the scan stops early. Likewise, once the accepting last
    // state is reached the verdict is final.
    let mut n_active = 1usize;

    for event in events {
        if n_active == 0 || active[states.len() - 1] {
            break;
        }
        n_active = 0;
        next.fill(false);

        for (idx, state) in states.iter().enumerate() {
            if !active[idx] {
                continue;
            }
            match state.transition {
                DfaTransition::None => {}
                DfaTransition::AnyEvent => {
                    next[idx + 1] = true;
                    n_active += 1;
                }
                DfaTransition::SpecificEvent(flag) => {
                    if event.events.test(flag) {
                        next[idx + 1] = true;
                        n_active += 1;
                    }
                }
            }
            if state.has_kleene {
                next[idx] = true;
                n_active += 1;
            }
        }
        std::mem::swap(&mut active, &mut next);
    }

    Ok(active[states.len() - 1])
}
