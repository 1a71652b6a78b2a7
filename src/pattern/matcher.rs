//! Backtracking matcher and its quick-rejection pre-filter.
//!
//! The backtracker is the full matcher: it honors temporal assertions by
//! carrying an anchor timestamp, supports resuming for non-overlapping
//! counting, and can record the longest partial match it witnesses. The
//! pre-filter checks a necessary condition cheaply so obviously hopeless
//! inputs never reach the exponential search.
//!
//! Both routines are bounded by a pure-work iteration cap instead of a
//! clock, so their verdicts are deterministic for a given input.

use crate::common::event::Event;
use crate::common::timestamp::Timestamp;
use crate::error::{Error, Result};
use crate::pattern::parser::{CompiledPattern, PatternAction};

/// Iteration cap shared by the matcher and the pre-filter; exceeding it
/// aborts the evaluation with [`Error::TooSlow`].
pub const MAX_ITERATIONS: usize = 1_000_000;

/// Quick rejection: checks that the deterministic runs of the pattern occur
/// in order somewhere in `events`.
///
/// The action list is split into maximal runs of `SpecificEvent`/`AnyEvent`
/// atoms separated by Kleene stars and temporal assertions. Each run is
/// scanned for from where the previous one ended, restarting a run one event
/// further on every mismatch. A missing run proves a full match impossible;
/// finding every run proves nothing (necessary, not sufficient).
pub fn could_match_deterministic_parts<T: Timestamp>(
    pattern: &CompiledPattern,
    events: &[Event<T>],
) -> Result<bool> {
    let actions = pattern.actions();
    let mut events_pos = 0usize;
    let mut events_processed = 0usize;
    let mut run_begin = 0usize;

    for idx in 0..=actions.len() {
        let at_separator = idx == actions.len()
            || !matches!(
                actions[idx],
                PatternAction::SpecificEvent(_) | PatternAction::AnyEvent
            );
        if !at_separator {
            continue;
        }
        if !match_run(
            actions,
            run_begin,
            idx,
            events,
            &mut events_pos,
            &mut events_processed,
        )? {
            return Ok(false);
        }
        run_begin = idx + 1;
    }
    Ok(true)
}

/// Scans forward for one deterministic run `actions[run_begin..run_end]`.
fn match_run<T: Timestamp>(
    actions: &[PatternAction],
    run_begin: usize,
    run_end: usize,
    events: &[Event<T>],
    events_pos: &mut usize,
    events_processed: &mut usize,
) -> Result<bool> {
    let mut restart = *events_pos;
    let mut run_pos = run_begin;

    while run_pos < run_end && *events_pos < events.len() {
        match actions[run_pos] {
            PatternAction::AnyEvent => {
                *events_pos += 1;
                run_pos += 1;
            }
            PatternAction::SpecificEvent(flag) => {
                if events[*events_pos].events.test(flag) {
                    *events_pos += 1;
                    run_pos += 1;
                } else {
                    // Abandon this attempt, retry the run one event later.
                    restart += 1;
                    *events_pos = restart;
                    run_pos = run_begin;
                }
            }
            _ => return Err(Error::Logical("non-deterministic action inside a run")),
        }

        *events_processed += 1;
        if *events_processed > MAX_ITERATIONS {
            return Err(Error::TooSlow {
                limit: MAX_ITERATIONS,
            });
        }
    }
    Ok(run_pos == run_end)
}

/// Matches `pattern` against `events[*cursor..]`, honoring temporal
/// assertions.
///
/// On return `*cursor` sits one past the last event the attempt consumed,
/// which is exactly where the next non-overlapping attempt should start; a
/// caller counting matches re-invokes until the cursor reaches the end or an
/// attempt fails.
pub fn backtracking_match<T: Timestamp>(
    pattern: &CompiledPattern,
    events: &[Event<T>],
    cursor: &mut usize,
) -> Result<bool> {
    match_impl(pattern, events, cursor, None)
}

/// Runs the matcher once in recording mode and returns the timestamps of the
/// longest partial match witnessed: for every `SpecificEvent` success along
/// the search, the prefix of matched timestamps is a candidate, and the
/// longest one ever seen is kept, whether or not the full pattern matched.
pub fn longest_match_prefix<T: Timestamp>(
    pattern: &CompiledPattern,
    events: &[Event<T>],
) -> Result<Vec<T>> {
    let mut best = Vec::new();
    let mut cursor = 0usize;
    match_impl(pattern, events, &mut cursor, Some(&mut best))?;
    Ok(best)
}

/// A choice point: the action and event cursors plus the anchor at the time
/// the choice was made.
struct Frame {
    action_idx: usize,
    event_idx: usize,
    base_idx: usize,
}

fn match_impl<T: Timestamp>(
    pattern: &CompiledPattern,
    events: &[Event<T>],
    cursor: &mut usize,
    mut best: Option<&mut Vec<T>>,
) -> Result<bool> {
    let actions = pattern.actions();
    let events_begin = *cursor;

    let mut action_idx = 0usize;
    let mut event_idx = events_begin;
    // The anchor: index of the event most recently committed to the match.
    // Temporal assertions compare against its timestamp plus the duration.
    let mut base_idx = event_idx;

    let mut back_stack: Vec<Frame> = Vec::new();
    // Recording mode only: the current partial match and, per entry, the
    // action that produced it (so backtracking knows what to revert).
    let mut matched_events: Vec<T> = Vec::new();
    let mut matched_actions: Vec<usize> = Vec::new();

    let mut iterations = 0usize;

    macro_rules! backtrack_or_break {
        () => {
            if !pop_frame(
                &mut back_stack,
                events.len(),
                &mut action_idx,
                &mut event_idx,
                &mut base_idx,
                &mut matched_events,
                &mut matched_actions,
            ) {
                break;
            }
        };
    }

    while action_idx < actions.len() && event_idx < events.len() {
        match actions[action_idx] {
            PatternAction::SpecificEvent(flag) => {
                if events[event_idx].events.test(flag) {
                    back_stack.push(Frame {
                        action_idx,
                        event_idx,
                        base_idx,
                    });
                    if let Some(best) = best.as_mut() {
                        matched_events.push(events[event_idx].timestamp);
                        matched_actions.push(action_idx);
                        if best.len() < matched_events.len() {
                            best.clone_from(&matched_events);
                        }
                    }
                    base_idx = event_idx;
                    action_idx += 1;
                    event_idx += 1;
                } else {
                    backtrack_or_break!();
                }
            }
            PatternAction::AnyEvent => {
                base_idx = event_idx;
                action_idx += 1;
                event_idx += 1;
            }
            PatternAction::KleeneStar => {
                back_stack.push(Frame {
                    action_idx,
                    event_idx,
                    base_idx,
                });
                base_idx = event_idx;
                action_idx += 1;
            }
            PatternAction::TimeLessOrEqual(d) => {
                if events[event_idx].timestamp <= events[base_idx].timestamp.advance(d) {
                    back_stack.push(Frame {
                        action_idx,
                        event_idx,
                        base_idx,
                    });
                    base_idx = event_idx;
                    action_idx += 1;
                } else {
                    backtrack_or_break!();
                }
            }
            PatternAction::TimeLess(d) => {
                if events[event_idx].timestamp < events[base_idx].timestamp.advance(d) {
                    back_stack.push(Frame {
                        action_idx,
                        event_idx,
                        base_idx,
                    });
                    base_idx = event_idx;
                    action_idx += 1;
                } else {
                    backtrack_or_break!();
                }
            }
            PatternAction::TimeGreaterOrEqual(d) => {
                if events[event_idx].timestamp >= events[base_idx].timestamp.advance(d) {
                    back_stack.push(Frame {
                        action_idx,
                        event_idx,
                        base_idx,
                    });
                    base_idx = event_idx;
                    action_idx += 1;
                } else {
                    // Not far enough in time yet: recoverable by consuming
                    // more events, unlike the Less* family.
                    event_idx += 1;
                    if event_idx == events.len() {
                        backtrack_or_break!();
                    }
                }
            }
            PatternAction::TimeGreater(d) => {
                if events[event_idx].timestamp > events[base_idx].timestamp.advance(d) {
                    back_stack.push(Frame {
                        action_idx,
                        event_idx,
                        base_idx,
                    });
                    base_idx = event_idx;
                    action_idx += 1;
                } else {
                    event_idx += 1;
                    if event_idx == events.len() {
                        backtrack_or_break!();
                    }
                }
            }
            PatternAction::TimeEqual(d) => {
                if events[event_idx].timestamp == events[base_idx].timestamp.advance(d) {
                    back_stack.push(Frame {
                        action_idx,
                        event_idx,
                        base_idx,
                    });
                    base_idx = event_idx;
                    action_idx += 1;
                } else {
                    event_idx += 1;
                    if event_idx == events.len() {
                        backtrack_or_break!();
                    }
                }
            }
        }

        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return Err(Error::TooSlow {
                limit: MAX_ITERATIONS,
            });
        }
    }

    // Trailing actions that accept the empty suffix are satisfied with the
    // input exhausted.
    while action_idx < actions.len() {
        match actions[action_idx] {
            PatternAction::KleeneStar
            | PatternAction::TimeLessOrEqual(_)
            | PatternAction::TimeLess(_)
            | PatternAction::TimeGreaterOrEqual(0) => action_idx += 1,
            _ => break,
        }
    }

    // An attempt that consumed nothing still advances the cursor, so a
    // counting caller always makes progress.
    if event_idx == events_begin {
        event_idx += 1;
    }

    *cursor = event_idx;
    Ok(action_idx == actions.len())
}

/// Pops choice points until one leaves the event cursor in bounds. Restores
/// the action cursor and anchor, advances the event cursor past the frame's
/// event, and reverts recorded entries the restored cursor invalidates.
fn pop_frame<T>(
    back_stack: &mut Vec<Frame>,
    events_len: usize,
    action_idx: &mut usize,
    event_idx: &mut usize,
    base_idx: &mut usize,
    matched_events: &mut Vec<T>,
    matched_actions: &mut Vec<usize>,
) -> bool {
    while let Some(frame) = back_stack.pop() {
        *action_idx = frame.action_idx;
        *event_idx = frame.event_idx + 1;
        *base_idx = frame.base_idx;

        while matched_actions
            .last()
            .is_some_and(|&recorded| recorded >= frame.action_idx)
        {
            matched_actions.pop();
            matched_events.pop();
        }

        if *event_idx < events_len {
            return true;
        }
    }
    false
}
