//! # `seqmatch` — Temporal event-sequence pattern matching
//!
//! An aggregate-operator core that evaluates a compact regular-expression-like
//! pattern over a time-ordered stream of rows, where each row carries a
//! timestamp and up to 32 boolean event flags.
//!
//! ## Operations
//!
//! | Operation | Result | Description |
//! |-----------|--------|-------------|
//! | `match` | `bool` | Does the pattern occur in the sequence? |
//! | `count` | `u64` | Number of non-overlapping occurrences (greedy-left) |
//! | `matched-events` | `Vec<T>` | Timestamps of the longest partial match |
//!
//! ## Pattern Syntax
//!
//! ```text
//! (?N)      — event with flag N (1-indexed)
//! .         — any single event
//! .*        — zero or more events
//! (?t<=N) (?t<N) (?t>=N) (?t>N) (?t==N)
//!           — temporal window relative to the previously matched event
//! ```
//!
//! ## Architecture
//!
//! Rows are collected per group into an [`EventBuffer`] (append, merge,
//! lazy sort, binary state codec for distributed aggregation). The pattern
//! compiles once per operator into a linear action list plus a DFA. Time-free
//! patterns are decided by the DFA in a single pass; temporal patterns go
//! through a cheap deterministic-parts pre-filter and then a bounded
//! backtracking matcher. All matching is capped at [`MAX_ITERATIONS`] units
//! of work and aborts deterministically with `TooSlow` beyond that.
//!
//! ```
//! use seqmatch::{ColumnType, EventBuffer, EventMask, SequenceOperator};
//!
//! let operator = SequenceOperator::new(
//!     &[ColumnType::DateTime, ColumnType::UInt8, ColumnType::UInt8],
//!     &["(?1)(?t<=3600)(?2)"],
//! )?;
//!
//! let mut group = EventBuffer::<u32>::new();
//! group.add(1_000, EventMask::from_bools(&[true, false]));
//! group.add(2_000, EventMask::from_bools(&[false, true]));
//!
//! assert!(operator.matches(&mut group)?);
//! # Ok::<(), seqmatch::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod error;
pub mod pattern;
pub mod sequence;

pub use buffer::EventBuffer;
pub use common::event::{Event, EventMask, MAX_EVENTS};
pub use common::timestamp::{Timestamp, TimestampKind};
pub use error::{Error, Result};
pub use pattern::matcher::MAX_ITERATIONS;
pub use pattern::parser::CompiledPattern;
pub use sequence::{ColumnType, SequenceOperator, Signature};
