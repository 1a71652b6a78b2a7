//! Error types shared across the crate.
//!
//! Construction-time failures (pattern syntax, argument validation) and
//! finalize-time failures (iteration cap, corrupt serialized state) share one
//! enum so callers handle a single error type end to end.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while constructing or evaluating a sequence operator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The pattern string has an unparseable token. `position` is the byte
    /// offset of the offending input.
    #[error("syntax error at position {position}: {message}")]
    Syntax {
        /// Human-readable description of what failed to parse.
        message: String,
        /// Byte offset in the pattern string where parsing stopped.
        position: usize,
    },

    /// The pattern is well-formed but semantically invalid, e.g. an event
    /// index out of range or a temporal condition with no preceding event.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// An argument column has an unsupported type.
    #[error("illegal type of argument: {0}")]
    IllegalTypeOfArgument(String),

    /// The operator was constructed with the wrong number of parameters.
    #[error("expected {expected} parameter(s), got {actual}")]
    NumberOfArgumentsDoesntMatch {
        /// Required parameter count.
        expected: usize,
        /// Provided parameter count.
        actual: usize,
    },

    /// Fewer argument columns than the minimum of one timestamp plus two
    /// event conditions.
    #[error("at least {min} arguments required, got {actual}")]
    TooFewArguments {
        /// Minimum total argument count.
        min: usize,
        /// Provided total argument count.
        actual: usize,
    },

    /// More event condition columns than the matcher supports.
    #[error("at most {max} event arguments supported, got {actual}")]
    TooManyArguments {
        /// Maximum supported event count.
        max: usize,
        /// Provided event count.
        actual: usize,
    },

    /// The matcher exceeded its iteration cap. The bound is pure-work-based,
    /// so the verdict is deterministic for a given pattern and input.
    #[error("pattern application proves too difficult, exceeding max iterations ({limit})")]
    TooSlow {
        /// The iteration cap that was exceeded.
        limit: usize,
    },

    /// Internal invariant violation. Indicates a bug, not bad input.
    #[error("logical error: {0}")]
    Logical(&'static str),

    /// Serialized state could not be read back (short read, malformed length).
    #[error("malformed serialized state: {0}")]
    Io(#[from] std::io::Error),
}
