// SPDX-License-Identifier: MIT

//! Pattern compilation and matching over event sequences.
//!
//! # Pattern Syntax
//!
//! ```text
//! (?N)      — Match an event where flag N (1-indexed) is set
//! .         — Match exactly one event (any flags)
//! .*        — Match zero or more events
//! (?t<=N)   — At most N time units since the previous matched event
//! (?t<N)    — Less than N time units since the previous matched event
//! (?t>=N)   — At least N time units since the previous matched event
//! (?t>N)    — More than N time units since the previous matched event
//! (?t==N)   — Exactly N time units since the previous matched event
//! ```
//!
//! A pattern compiles into two parallel artifacts: a linear action list for
//! the backtracking matcher and, for time-free patterns, a DFA that decides
//! existence in a single pass.

pub mod dfa;
pub mod matcher;
pub mod parser;
