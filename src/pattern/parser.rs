// SPDX-License-Identifier: MIT

//! Pattern compiler: parses a pattern string into an action list and a DFA.
//!
//! The action list drives the backtracking matcher and always starts with an
//! implicit `KleeneStar`, so a pattern may begin matching at any point of the
//! sequence. The DFA mirrors the deterministic structure of the pattern and
//! is only valid when the pattern carries no temporal assertions.

use crate::common::event::EventMask;
use crate::error::{Error, Result};

/// One compiled unit of a pattern.
///
/// Temporal actions assert a relation between the current event's timestamp
/// and the anchor timestamp plus the stored duration; they never consume an
/// event themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternAction {
    /// The next event must have the given flag (0-indexed) set.
    SpecificEvent(usize),
    /// Any single event.
    AnyEvent,
    /// Zero or more events, unconstrained.
    KleeneStar,
    /// Current timestamp must be at most `anchor + duration`.
    TimeLessOrEqual(u64),
    /// Current timestamp must be strictly below `anchor + duration`.
    TimeLess(u64),
    /// Current timestamp must be at least `anchor + duration`.
    TimeGreaterOrEqual(u64),
    /// Current timestamp must be strictly above `anchor + duration`.
    TimeGreater(u64),
    /// Current timestamp must equal `anchor + duration`.
    TimeEqual(u64),
}

impl PatternAction {
    /// Returns true for the event-consuming actions that may precede a
    /// temporal assertion.
    #[must_use]
    pub const fn is_event_like(self) -> bool {
        matches!(
            self,
            Self::SpecificEvent(_) | Self::AnyEvent | Self::KleeneStar
        )
    }

    /// Returns true for temporal assertions.
    #[must_use]
    pub const fn is_time(self) -> bool {
        !self.is_event_like()
    }
}

/// Labeled transition out of a DFA state. Each state has at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DfaTransition {
    /// No outgoing transition (the accepting last state).
    #[default]
    None,
    /// Advance on any event.
    AnyEvent,
    /// Advance on an event with the given flag set.
    SpecificEvent(usize),
}

/// One DFA state: an optional transition to the next state plus a Kleene
/// self-loop flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct DfaState {
    /// Transition to state `index + 1`, if any.
    pub transition: DfaTransition,
    /// Whether the state loops to itself on any event.
    pub has_kleene: bool,
}

/// A compiled pattern: the action list, the parallel DFA, and the metadata
/// the operator façade needs for dispatch and short-circuiting.
///
/// Immutable after compilation and safe to share across threads.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    actions: Vec<PatternAction>,
    dfa_states: Vec<DfaState>,
    has_time: bool,
    conditions_in_pattern: EventMask,
}

impl CompiledPattern {
    /// Compiles `pattern` for an operator with `event_count` event flags
    /// (so `(?N)` is valid for `N` in `1..=event_count`).
    pub fn compile(pattern: &str, event_count: usize) -> Result<Self> {
        Compiler::new(pattern, event_count).run()
    }

    /// The pattern string this was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The action list. The first action is always `KleeneStar`.
    #[must_use]
    pub fn actions(&self) -> &[PatternAction] {
        &self.actions
    }

    /// The DFA states. Only meaningful when [`CompiledPattern::has_time`]
    /// is false.
    #[must_use]
    pub fn dfa_states(&self) -> &[DfaState] {
        &self.dfa_states
    }

    /// Whether the pattern contains any temporal assertion.
    #[must_use]
    pub const fn has_time(&self) -> bool {
        self.has_time
    }

    /// Union of the event flags named by `(?N)` atoms.
    #[must_use]
    pub const fn conditions_in_pattern(&self) -> EventMask {
        self.conditions_in_pattern
    }
}

struct Compiler<'a> {
    source: &'a str,
    input: &'a [u8],
    pos: usize,
    event_count: usize,
    actions: Vec<PatternAction>,
    dfa_states: Vec<DfaState>,
    has_time: bool,
    conditions_in_pattern: EventMask,
}

impl<'a> Compiler<'a> {
    fn new(pattern: &'a str, event_count: usize) -> Self {
        Self {
            source: pattern,
            input: pattern.as_bytes(),
            pos: 0,
            event_count,
            // The implicit leading star lets a match start anywhere; its DFA
            // counterpart is the initial state's self-loop.
            actions: vec![PatternAction::KleeneStar],
            dfa_states: vec![DfaState {
                transition: DfaTransition::None,
                has_kleene: true,
            }],
            has_time: false,
            conditions_in_pattern: EventMask::EMPTY,
        }
    }

    fn run(mut self) -> Result<CompiledPattern> {
        while self.pos < self.input.len() {
            if self.eat(b"(?") {
                if self.eat(b"t") {
                    self.parse_time()?;
                } else {
                    self.parse_event_atom()?;
                }
                self.expect(b')')?;
            } else if self.eat(b".*") {
                self.actions.push(PatternAction::KleeneStar);
                self.last_state().has_kleene = true;
            } else if self.eat(b".") {
                self.actions.push(PatternAction::AnyEvent);
                self.last_state().transition = DfaTransition::AnyEvent;
                self.dfa_states.push(DfaState::default());
            } else {
                return Err(self.syntax("unexpected starting symbol"));
            }
        }

        Ok(CompiledPattern {
            source: self.source.to_string(),
            actions: self.actions,
            dfa_states: self.dfa_states,
            has_time: self.has_time,
            conditions_in_pattern: self.conditions_in_pattern,
        })
    }

    fn parse_event_atom(&mut self) -> Result<()> {
        let start = self.pos;
        let event_number = self.parse_number(start)?;
        if event_number == 0 || event_number > self.event_count as u64 {
            return Err(Error::BadArguments(format!(
                "event number {event_number} is out of range, must be in 1..={}",
                self.event_count
            )));
        }
        let idx = (event_number - 1) as usize;
        self.actions.push(PatternAction::SpecificEvent(idx));
        self.last_state().transition = DfaTransition::SpecificEvent(idx);
        self.dfa_states.push(DfaState::default());
        self.conditions_in_pattern.set(idx);
        Ok(())
    }

    fn parse_time(&mut self) -> Result<()> {
        // Longest operator first, so "<=" is not read as "<" followed by "=".
        let action = if self.eat(b"<=") {
            PatternAction::TimeLessOrEqual
        } else if self.eat(b"<") {
            PatternAction::TimeLess
        } else if self.eat(b">=") {
            PatternAction::TimeGreaterOrEqual
        } else if self.eat(b">") {
            PatternAction::TimeGreater
        } else if self.eat(b"==") {
            PatternAction::TimeEqual
        } else {
            return Err(self.syntax("unknown time condition"));
        };

        let start = self.pos;
        let duration = self.parse_number(start)?;

        // A temporal assertion is anchored on the event matched just before
        // it, so something event-like must precede it in the action list.
        if !self
            .actions
            .last()
            .is_some_and(|last| last.is_event_like())
        {
            return Err(Error::BadArguments(
                "temporal condition must be preceded by an event condition".to_string(),
            ));
        }

        self.has_time = true;
        self.actions.push(action(duration));
        Ok(())
    }

    fn parse_number(&mut self, start: usize) -> Result<u64> {
        let mut value: u64 = 0;
        let mut digits = 0;
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(c - b'0')))
                .ok_or_else(|| Error::Syntax {
                    message: "number overflow".to_string(),
                    position: start,
                })?;
            digits += 1;
            self.pos += 1;
        }
        if digits == 0 {
            return Err(self.syntax("could not parse number"));
        }
        Ok(value)
    }

    fn last_state(&mut self) -> &mut DfaState {
        // dfa_states is seeded with one state and only ever grows.
        self.dfa_states.last_mut().expect("dfa_states is non-empty")
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn eat(&mut self, token: &[u8]) -> bool {
        if self.input[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.syntax(&format!("expected '{}'", char::from(expected))))
        }
    }

    fn syntax(&self, message: &str) -> Error {
        Error::Syntax {
            message: message.to_string(),
            position: self.pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::event::MAX_EVENTS;

    fn compile(pattern: &str) -> CompiledPattern {
        CompiledPattern::compile(pattern, 8).unwrap()
    }

    #[test]
    fn leading_kleene_star_is_implicit() {
        let p = compile("(?1)");
        assert_eq!(
            p.actions(),
            &[PatternAction::KleeneStar, PatternAction::SpecificEvent(0)]
        );
        assert!(p.dfa_states()[0].has_kleene);
    }

    #[test]
    fn two_atoms() {
        let p = compile("(?1)(?2)");
        assert_eq!(
            p.actions(),
            &[
                PatternAction::KleeneStar,
                PatternAction::SpecificEvent(0),
                PatternAction::SpecificEvent(1),
            ]
        );
        assert_eq!(p.conditions_in_pattern().bits(), 0b11);
        assert!(!p.has_time());
    }

    #[test]
    fn wildcards_and_star() {
        let p = compile("(?1).*(?2).(?3)");
        assert_eq!(
            p.actions(),
            &[
                PatternAction::KleeneStar,
                PatternAction::SpecificEvent(0),
                PatternAction::KleeneStar,
                PatternAction::SpecificEvent(1),
                PatternAction::AnyEvent,
                PatternAction::SpecificEvent(2),
            ]
        );
    }

    #[test]
    fn dfa_mirrors_deterministic_atoms() {
        let p = compile("(?1).*(?2).");
        // One state per Specific/Any atom plus the accepting state.
        assert_eq!(p.dfa_states().len(), 4);
        assert_eq!(p.dfa_states()[0].transition, DfaTransition::SpecificEvent(0));
        assert!(p.dfa_states()[0].has_kleene);
        assert_eq!(p.dfa_states()[1].transition, DfaTransition::SpecificEvent(1));
        assert!(p.dfa_states()[1].has_kleene);
        assert_eq!(p.dfa_states()[2].transition, DfaTransition::AnyEvent);
        assert!(!p.dfa_states()[2].has_kleene);
        assert_eq!(p.dfa_states()[3].transition, DfaTransition::None);
    }

    #[test]
    fn dfa_state_count_invariant() {
        for (pattern, atoms) in [("(?1)", 1), ("(?1)(?2).", 3), (".*", 0), ("", 0)] {
            let p = compile(pattern);
            assert_eq!(p.dfa_states().len(), atoms + 1, "pattern {pattern:?}");
        }
    }

    #[test]
    fn empty_pattern_compiles_to_lone_star() {
        let p = compile("");
        assert_eq!(p.actions(), &[PatternAction::KleeneStar]);
        assert_eq!(p.dfa_states().len(), 1);
    }

    #[test]
    fn time_ops_parse() {
        let cases = [
            ("(?1)(?t<=10)(?2)", PatternAction::TimeLessOrEqual(10)),
            ("(?1)(?t<10)(?2)", PatternAction::TimeLess(10)),
            ("(?1)(?t>=10)(?2)", PatternAction::TimeGreaterOrEqual(10)),
            ("(?1)(?t>10)(?2)", PatternAction::TimeGreater(10)),
            ("(?1)(?t==10)(?2)", PatternAction::TimeEqual(10)),
        ];
        for (pattern, expected) in cases {
            let p = compile(pattern);
            assert_eq!(p.actions()[2], expected, "pattern {pattern:?}");
            assert!(p.has_time());
        }
    }

    #[test]
    fn time_op_longest_match_wins() {
        // "<=" must not parse as "<" with a stray "=".
        let p = compile("(?1)(?t<=3600)(?2)");
        assert_eq!(p.actions()[2], PatternAction::TimeLessOrEqual(3600));
    }

    #[test]
    fn time_action_does_not_extend_dfa() {
        let p = compile("(?1)(?t<=5)(?2)");
        assert_eq!(p.dfa_states().len(), 3);
    }

    #[test]
    fn time_after_star_is_allowed() {
        let p = compile("(?1).*(?t<=5)(?2)");
        assert_eq!(p.actions()[3], PatternAction::TimeLessOrEqual(5));
    }

    #[test]
    fn leading_time_is_allowed_by_implicit_star() {
        // The implicit leading KleeneStar is event-like, so a pattern may
        // open with a temporal assertion.
        let p = compile("(?t<=5)(?1)");
        assert_eq!(p.actions()[1], PatternAction::TimeLessOrEqual(5));
    }

    #[test]
    fn consecutive_time_actions_rejected() {
        let err = CompiledPattern::compile("(?1)(?t<=5)(?t>=1)(?2)", 8).unwrap_err();
        assert!(matches!(err, Error::BadArguments(_)), "got {err:?}");
    }

    #[test]
    fn event_number_zero_rejected() {
        let err = CompiledPattern::compile("(?0)", 8).unwrap_err();
        assert!(matches!(err, Error::BadArguments(_)));
    }

    #[test]
    fn event_number_above_count_rejected() {
        let err = CompiledPattern::compile("(?9)", 8).unwrap_err();
        assert!(matches!(err, Error::BadArguments(_)));
    }

    #[test]
    fn event_number_32_accepted_at_limit() {
        let p = CompiledPattern::compile("(?32)", MAX_EVENTS).unwrap();
        assert_eq!(p.actions()[1], PatternAction::SpecificEvent(31));
        assert!(p.conditions_in_pattern().test(31));
    }

    #[test]
    fn event_number_33_rejected_at_limit() {
        let err = CompiledPattern::compile("(?33)", MAX_EVENTS).unwrap_err();
        assert!(matches!(err, Error::BadArguments(_)));
    }

    #[test]
    fn unterminated_group_reports_position() {
        let err = CompiledPattern::compile("(?1", 8).unwrap_err();
        match err {
            Error::Syntax { position, message } => {
                assert_eq!(position, 3);
                assert!(message.contains("expected ')'"));
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_symbol_reports_position() {
        let err = CompiledPattern::compile("(?1)x(?2)", 8).unwrap_err();
        match err {
            Error::Syntax { position, .. } => assert_eq!(position, 4),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn whitespace_is_rejected() {
        assert!(CompiledPattern::compile("(?1) (?2)", 8).is_err());
    }

    #[test]
    fn unknown_time_operator_rejected() {
        let err = CompiledPattern::compile("(?1)(?t~5)(?2)", 8).unwrap_err();
        match err {
            Error::Syntax { message, .. } => assert!(message.contains("time condition")),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn time_missing_number_rejected() {
        let err = CompiledPattern::compile("(?1)(?t>=)(?2)", 8).unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn number_overflow_rejected() {
        let err = CompiledPattern::compile("(?1)(?t<=99999999999999999999)(?2)", 8).unwrap_err();
        match err {
            Error::Syntax { message, .. } => assert!(message.contains("overflow")),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn multi_digit_event_number() {
        let p = CompiledPattern::compile("(?12)", 16).unwrap();
        assert_eq!(p.actions()[1], PatternAction::SpecificEvent(11));
    }

    #[test]
    fn source_is_preserved() {
        let p = compile("(?1).*(?2)");
        assert_eq!(p.source(), "(?1).*(?2)");
    }

    #[test]
    fn large_duration_parses() {
        let p = compile("(?1)(?t<=18446744073709551615)(?2)");
        assert_eq!(p.actions()[2], PatternAction::TimeLessOrEqual(u64::MAX));
    }
}
