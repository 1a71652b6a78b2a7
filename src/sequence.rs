// SPDX-License-Identifier: MIT

//! Sequence operators: `match`, `count`, and `matched-events` over one
//! compiled pattern.
//!
//! The operator is constructed once per query from the argument types and the
//! pattern string, then shared read-only across every group. Each group owns
//! an [`EventBuffer`]; at finalize the operator sorts the buffer and asks one
//! of the three surface operations for a result.
//!
//! # Usage
//!
//! ```
//! use seqmatch::{ColumnType, EventBuffer, EventMask, SequenceOperator};
//!
//! let operator = SequenceOperator::new(
//!     &[ColumnType::UInt64, ColumnType::UInt8, ColumnType::UInt8],
//!     &["(?1).*(?2)"],
//! )
//! .unwrap();
//!
//! let mut group = EventBuffer::<u64>::new();
//! group.add(1, EventMask::from_bools(&[true, false]));
//! group.add(9, EventMask::from_bools(&[false, true]));
//!
//! assert!(operator.matches(&mut group).unwrap());
//! assert_eq!(operator.count(&mut group).unwrap(), 1);
//! assert_eq!(operator.matched_events(&mut group).unwrap(), vec![1, 9]);
//! ```

use std::sync::Arc;

use tracing::{debug, trace};

use crate::buffer::EventBuffer;
use crate::common::event::MAX_EVENTS;
use crate::common::timestamp::{Timestamp, TimestampKind};
use crate::error::{Error, Result};
use crate::pattern::dfa::dfa_match;
use crate::pattern::matcher::{
    backtracking_match, could_match_deterministic_parts, longest_match_prefix,
};
use crate::pattern::parser::CompiledPattern;

/// Minimum total argument count: one timestamp column plus two event columns.
const MIN_ARGS: usize = 3;

/// Column types accepted by the operator signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Calendar date, 16-bit day number.
    Date,
    /// Date and time, 32-bit epoch seconds.
    DateTime,
    /// 8-bit unsigned integer; the required type for event columns.
    UInt8,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit unsigned integer.
    UInt64,
}

impl ColumnType {
    const fn timestamp_kind(self) -> Option<TimestampKind> {
        match self {
            Self::Date => Some(TimestampKind::Date),
            Self::DateTime => Some(TimestampKind::DateTime),
            Self::UInt16 => Some(TimestampKind::UInt16),
            Self::UInt32 => Some(TimestampKind::UInt32),
            Self::UInt64 => Some(TimestampKind::UInt64),
            Self::UInt8 => None,
        }
    }
}

/// A validated operator signature: the timestamp kind of column 0 and the
/// number of event columns after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    timestamp: TimestampKind,
    event_count: usize,
}

impl Signature {
    /// Validates the argument-type list and parameter list shape.
    ///
    /// Exactly one parameter (the pattern string) is expected; the argument
    /// list must hold a timestamp column followed by 2..=32 event columns of
    /// type `UInt8`.
    pub fn validate(arguments: &[ColumnType], parameter_count: usize) -> Result<Self> {
        if parameter_count != 1 {
            return Err(Error::NumberOfArgumentsDoesntMatch {
                expected: 1,
                actual: parameter_count,
            });
        }
        if arguments.len() < MIN_ARGS {
            return Err(Error::TooFewArguments {
                min: MIN_ARGS,
                actual: arguments.len(),
            });
        }
        if arguments.len() - 1 > MAX_EVENTS {
            return Err(Error::TooManyArguments {
                max: MAX_EVENTS,
                actual: arguments.len() - 1,
            });
        }

        let timestamp = arguments[0].timestamp_kind().ok_or_else(|| {
            Error::IllegalTypeOfArgument(format!(
                "first argument must be a date, datetime or unsigned integer timestamp, got {:?}",
                arguments[0]
            ))
        })?;

        for (i, arg) in arguments.iter().enumerate().skip(1) {
            if *arg != ColumnType::UInt8 {
                return Err(Error::IllegalTypeOfArgument(format!(
                    "argument {} must be UInt8, got {arg:?}",
                    i + 1
                )));
            }
        }

        Ok(Self {
            timestamp,
            event_count: arguments.len() - 1,
        })
    }

    /// The timestamp kind of column 0.
    #[must_use]
    pub const fn timestamp(self) -> TimestampKind {
        self.timestamp
    }

    /// The number of event columns.
    #[must_use]
    pub const fn event_count(self) -> usize {
        self.event_count
    }
}

/// The sequence operator: a validated signature plus the compiled pattern,
/// shared read-only across all groups of one aggregation.
///
/// Only the event buffers travel between aggregation workers; the pattern is
/// reconstructed on every node from the operator's constant string.
#[derive(Debug, Clone)]
pub struct SequenceOperator {
    signature: Signature,
    pattern: Arc<CompiledPattern>,
}

impl SequenceOperator {
    /// Builds an operator from the argument-type list and the parameter list
    /// (which must hold exactly the pattern string).
    pub fn new(arguments: &[ColumnType], parameters: &[&str]) -> Result<Self> {
        let signature = Signature::validate(arguments, parameters.len())?;
        let pattern = CompiledPattern::compile(parameters[0], signature.event_count())?;
        trace!(
            pattern = parameters[0],
            event_count = signature.event_count(),
            has_time = pattern.has_time(),
            "compiled sequence pattern"
        );
        Ok(Self {
            signature,
            pattern: Arc::new(pattern),
        })
    }

    /// The validated signature.
    #[must_use]
    pub const fn signature(&self) -> Signature {
        self.signature
    }

    /// The compiled pattern.
    #[must_use]
    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    /// Returns true iff any flag named by the pattern never occurred in the
    /// buffer, in which case no full match is possible and the operation can
    /// short-circuit to its trivial answer.
    fn misses_required_conditions<T: Timestamp>(&self, buffer: &EventBuffer<T>) -> bool {
        let missing = !buffer
            .conditions_met()
            .contains(self.pattern.conditions_in_pattern());
        if missing {
            debug!("buffer lacks pattern conditions, short-circuiting");
        }
        missing
    }

    /// `match`: does the pattern occur in the buffer?
    ///
    /// Time-free patterns run on the DFA in a single pass; temporal patterns
    /// go through the deterministic-parts pre-filter and then the
    /// backtracking matcher.
    pub fn matches<T: Timestamp>(&self, buffer: &mut EventBuffer<T>) -> Result<bool> {
        if self.misses_required_conditions(buffer) {
            return Ok(false);
        }
        buffer.sort();

        if self.pattern.has_time() {
            if !could_match_deterministic_parts(&self.pattern, buffer.events())? {
                return Ok(false);
            }
            let mut cursor = 0;
            backtracking_match(&self.pattern, buffer.events(), &mut cursor)
        } else {
            dfa_match(&self.pattern, buffer.events())
        }
    }

    /// `count`: how many non-overlapping occurrences does the buffer hold?
    ///
    /// Greedy-left: the matcher is re-invoked from wherever the previous
    /// occurrence ended, so no event participates in two occurrences.
    pub fn count<T: Timestamp>(&self, buffer: &mut EventBuffer<T>) -> Result<u64> {
        if self.misses_required_conditions(buffer) {
            return Ok(0);
        }
        buffer.sort();

        if !could_match_deterministic_parts(&self.pattern, buffer.events())? {
            return Ok(0);
        }

        let events = buffer.events();
        let mut cursor = 0;
        let mut count = 0u64;
        while cursor < events.len() && backtracking_match(&self.pattern, events, &mut cursor)? {
            count += 1;
        }
        trace!(count, "sequence count finalized");
        Ok(count)
    }

    /// `matched-events`: the timestamps of the longest partial match
    /// attempted, one per satisfied `(?N)` atom.
    ///
    /// Runs the recording matcher unconditionally: even when a full match is
    /// trivially impossible, the longest prefix is still reported.
    pub fn matched_events<T: Timestamp>(&self, buffer: &mut EventBuffer<T>) -> Result<Vec<T>> {
        buffer.sort();
        longest_match_prefix(&self.pattern, buffer.events())
    }
}
