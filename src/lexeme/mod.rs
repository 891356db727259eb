//! Ready-made terminal tag implementations.
//!
//! A terminal tag is defined by its NFA step function, so a tag can always
//! be written by hand as an [`ITerminalTag`](crate::ITerminalTag)
//! implementation with explicit state masks. The utilities here cover the
//! two common cases: [`PatternTag`] derives the automaton from a regular
//! expression, and [`OffsideTag`] declares the synthetic
//! indentation/dedentation tags of the off-side rule.

use std::collections::BTreeSet;

use regex_automata::dfa::{dense, Automaton, StartKind};
use regex_automata::util::primitives::StateID;
use regex_automata::util::start;
use regex_automata::Anchored;

use crate::{Conditions, ITerminalTag, LexingState, TagId};

/// A terminal tag recognizing an anchored regular expression.
///
/// The pattern is compiled to a dense DFA once, and the tag's opaque state
/// mask carries the DFA state (shifted by one so `0` keeps meaning "no live
/// state"). This satisfies the lexer's resumable one-character-at-a-time
/// stepping contract, which the high-level regex API cannot.
pub struct PatternTag {
    name: &'static str,
    dfa: dense::DFA<Vec<u32>>,
    states_start: LexingState,
    ignore: bool,
    start_when: Option<Conditions>,
    positives: BTreeSet<TagId>,
    negatives: BTreeSet<TagId>,
}

impl PatternTag {
    /// Create a tag matching `pattern`.
    ///
    /// The pattern must not match the empty string.
    pub fn new(name: &'static str, pattern: &str) -> Result<Self, String> {
        let dfa = dense::DFA::builder()
            .configure(
                dense::DFA::config()
                    .start_kind(StartKind::Anchored)
                    .minimize(true),
            )
            .build(pattern)
            .map_err(|err| {
                format!("Pattern should be a valid regex expression. {}", err)
            })?;
        let start_state = dfa
            .start_state(&start::Config::new().anchored(Anchored::Yes))
            .map_err(|err| format!("Pattern has no usable start state. {}", err))?;

        if dfa.is_match_state(dfa.next_eoi_state(start_state)) {
            return Err(format!(
                "Regex expression '{}' should not be nullable.",
                pattern
            ));
        }

        Ok(Self {
            name,
            states_start: Self::mask(start_state),
            dfa,
            ignore: false,
            start_when: None,
            positives: BTreeSet::new(),
            negatives: BTreeSet::new(),
        })
    }

    /// Mark the tag as ignored: it participates in lexical analysis but
    /// produces no terminal symbol.
    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Restrict the tag to condition sets intersecting `conditions`.
    pub fn when(mut self, conditions: Conditions) -> Self {
        self.start_when = Some(conditions);
        self
    }

    /// Tags transitively added to any terminal this tag accepts.
    pub fn with_positives(mut self, tags: impl IntoIterator<Item = TagId>) -> Self {
        self.positives = tags.into_iter().collect();
        self
    }

    /// Tags transitively removed from any terminal this tag accepts.
    pub fn with_negatives(mut self, tags: impl IntoIterator<Item = TagId>) -> Self {
        self.negatives = tags.into_iter().collect();
        self
    }

    fn mask(state: StateID) -> LexingState {
        state.as_usize() as LexingState + 1
    }
}

impl ITerminalTag for PatternTag {
    fn name(&self) -> &'static str {
        self.name
    }

    fn states_start(&self) -> LexingState {
        self.states_start
    }

    fn start(&self, conditions: Conditions) -> bool {
        self.start_when
            .map_or(true, |mask| conditions & mask != 0)
    }

    fn ignore(&self, _conditions: Conditions) -> bool {
        self.ignore
    }

    fn positives(&self, _conditions: Conditions) -> BTreeSet<TagId> {
        self.positives.clone()
    }

    fn negatives(&self, _conditions: Conditions) -> BTreeSet<TagId> {
        self.negatives.clone()
    }

    fn nfa(&self, current_states: LexingState, ch: char) -> (bool, LexingState) {
        let state = current_states
            .checked_sub(1)
            .and_then(|raw| StateID::new(raw as usize).ok());
        let Some(mut state) = state else {
            return (false, 0);
        };

        let mut buffer = [0u8; 4];

        for &byte in ch.encode_utf8(&mut buffer).as_bytes() {
            state = self.dfa.next_state(state, byte);

            if self.dfa.is_dead_state(state) || self.dfa.is_quit_state(state) {
                return (false, 0);
            }
        }

        let state_accept = self.dfa.is_match_state(self.dfa.next_eoi_state(state));
        (state_accept, Self::mask(state))
    }
}

/// A synthetic indentation or dedentation terminal tag.
///
/// Off-side tags are excluded from NFA lexing; the lexer emits them itself
/// while tracking indentation levels, so their step function has no live
/// states.
pub struct OffsideTag {
    name: &'static str,
    indent: bool,
}

impl OffsideTag {
    pub fn indent(name: &'static str) -> Self {
        Self { name, indent: true }
    }

    pub fn dedent(name: &'static str) -> Self {
        Self {
            name,
            indent: false,
        }
    }
}

impl ITerminalTag for OffsideTag {
    fn name(&self) -> &'static str {
        self.name
    }

    fn indent(&self, _conditions: Conditions) -> bool {
        self.indent
    }

    fn dedent(&self, _conditions: Conditions) -> bool {
        !self.indent
    }

    fn nfa(&self, _current_states: LexingState, _ch: char) -> (bool, LexingState) {
        (false, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_tag_steps_like_an_nfa() {
        let tag = PatternTag::new("Number", "[0-9]+").unwrap();
        let states = tag.states_start();

        let (accept, states) = tag.nfa(states, '4');
        assert!(accept);
        assert_ne!(states, 0);

        let (accept, states) = tag.nfa(states, '2');
        assert!(accept);
        assert_ne!(states, 0);

        let (accept, states) = tag.nfa(states, 'x');
        assert!(!accept);
        assert_eq!(states, 0);
    }

    #[test]
    fn pattern_tag_accepts_only_at_match_lengths() {
        let tag = PatternTag::new("Float", r"[0-9]+\.[0-9]+").unwrap();
        let mut states = tag.states_start();
        let mut accepts = Vec::new();

        for ch in "12.34".chars() {
            let (accept, next) = tag.nfa(states, ch);
            accepts.push(accept);
            states = next;
        }

        assert_eq!(accepts, vec![false, false, false, true, true]);
    }

    #[test]
    fn nullable_patterns_are_rejected() {
        assert!(PatternTag::new("Spaces", " *").is_err());
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(PatternTag::new("Broken", "[").is_err());
    }
}
