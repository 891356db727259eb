use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::error::{Error, LexicalConditionsError, LexicalError};
use crate::position::{Position, PositionId, Positions};
use crate::{Conditions, ITerminalTag, LexingState, Log, TagId};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
/// A stable handle to a [`Terminal`] owned by a [`Lexer`].
pub struct TerminalId(pub(crate) usize);

/// Terminal symbol (token) generated by lexical analysis.
///
/// Terminals form a singly-linked, lazily-extended list owned by the lexer:
/// once the terminal at an input offset has been materialized it is memoized
/// through the link and never recomputed. Terminals are compared by handle,
/// never by value.
#[derive(Debug, Clone)]
pub struct Terminal {
    /// Terminal tags attributed to the accepted input substring.
    pub tags: BTreeSet<TagId>,
    pub start: PositionId,
    pub end: PositionId,
    /// `None` while the following terminal has not been materialized;
    /// `Some(None)` memoizes end of input.
    next: Option<Option<TerminalId>>,
}

impl Terminal {
    /// The memoized follower, without triggering lexical analysis.
    pub fn memoized_next(&self) -> Option<Option<TerminalId>> {
        self.next
    }
}

/// Runtime data derived from the tag registry and the active conditions,
/// plus the memoization of the NFAs as they are driven.
#[derive(Default)]
struct LexerCache {
    states_start: HashMap<TagId, LexingState>,
    ignore: BTreeSet<TagId>,
    offside_tags: Option<(TagId, TagId)>,
    positives: HashMap<TagId, BTreeSet<TagId>>,
    negatives: HashMap<TagId, BTreeSet<TagId>>,
    accepted: HashMap<Vec<TagId>, BTreeSet<TagId>>,
    nfas: HashMap<(TagId, LexingState, char), (bool, LexingState)>,
}

/// Driver of the off-side rule: an indentation-level stack and the NFA
/// recognizing `(\n* [\t ]* ([^\t\n ] [^\n]* \n)?)*` over consumed input.
struct Offside {
    stack: Vec<usize>,
    state: LexingState,
}

const OFFSIDE_STATES_START: LexingState = 1 << 0 | 1 << 1 | 1 << 2;

impl Offside {
    fn new() -> Self {
        Self {
            stack: vec![1],
            state: OFFSIDE_STATES_START,
        }
    }

    /// One NFA step. Returns whether `ch` is the first non-whitespace
    /// character of its line.
    fn nfa(&mut self, ch: char) -> bool {
        let mut state_accept = false;
        let mut next_states: LexingState = 0;

        if 1 << 0 & self.state != 0 && ch == '\n' {
            next_states |= 1 << 0 | 1 << 1 | 1 << 2;
        }

        if 1 << 1 & self.state != 0 && (ch == '\t' || ch == ' ') {
            next_states |= 1 << 0 | 1 << 1 | 1 << 2;
        }

        if 1 << 2 & self.state != 0 && ch != '\t' && ch != '\n' && ch != ' ' {
            state_accept = true;
            next_states |= 1 << 0 | 1 << 3;
        }

        if 1 << 3 & self.state != 0 && ch != '\n' {
            next_states |= 1 << 0 | 1 << 3;
        }

        self.state = next_states;
        state_accept
    }

    fn top(&self) -> usize {
        self.stack.last().copied().unwrap_or(1)
    }
}

/// Main lexical analysis implementation.
///
/// A [`Lexer`] drives the NFA of every terminal tag selected by the runtime
/// conditions over the input, applying longest-match tokenization,
/// positive/negative tag refinement and the off-side rule. Analysis is
/// performed on demand through [`next_terminal`](Lexer::next_terminal) and
/// memoized, so repeated calls with the same argument return the same
/// handle.
pub struct Lexer {
    tags: Vec<Rc<dyn ITerminalTag>>,
    input: String,
    pub conditions: Conditions,
    /// Starting position of the first terminal. Re-anchored onto the first
    /// terminal once it is materialized, so both share one handle.
    pub start_position: PositionId,
    positions: Positions,
    terminals: Vec<Terminal>,
    start: Option<Option<TerminalId>>,
    cache: LexerCache,
    offside: Offside,
    log: OnceCell<Log<&'static str>>,
}

impl Lexer {
    /// Create a lexer over `input`, selecting and partitioning `tags` by
    /// the runtime `conditions`.
    ///
    /// Fails when the off-side tags are misconfigured: at most one tag may
    /// be marked indenting, at most one dedenting, and the two must be
    /// provided together.
    pub fn new(
        filename: &str,
        input: impl Into<String>,
        conditions: Conditions,
        tags: Vec<Rc<dyn ITerminalTag>>,
    ) -> Result<Self, Error> {
        let filename: Rc<str> = Rc::from(filename);
        let mut positions = Positions::new();
        let start_position = positions.insert(Position::new(filename));
        let mut cache = LexerCache::default();
        let mut indent_tag: Option<TagId> = None;
        let mut dedent_tag: Option<TagId> = None;

        let offside_free = |tag: &Rc<dyn ITerminalTag>| {
            tag.start(conditions) && !tag.indent(conditions) && !tag.dedent(conditions)
        };

        for (index, tag) in tags.iter().enumerate() {
            let id = TagId(index);

            if !tag.start(conditions) {
                continue;
            }

            if tag.indent(conditions) {
                if indent_tag.is_some() {
                    return Err(LexicalConditionsError::MultipleIndents(tag.name()).into());
                }

                indent_tag = Some(id);
                continue;
            }

            if tag.dedent(conditions) {
                if dedent_tag.is_some() {
                    return Err(LexicalConditionsError::MultipleDedents(tag.name()).into());
                }

                dedent_tag = Some(id);
                continue;
            }

            cache.states_start.insert(id, tag.states_start());

            if tag.ignore(conditions) {
                cache.ignore.insert(id);
            }

            cache.positives.insert(
                id,
                tag.positives(conditions)
                    .into_iter()
                    .filter(|t| tags.get(t.0).is_some_and(offside_free))
                    .collect(),
            );
            cache.negatives.insert(
                id,
                tag.negatives(conditions)
                    .into_iter()
                    .filter(|t| tags.get(t.0).is_some_and(offside_free))
                    .collect(),
            );
        }

        cache.offside_tags = match (indent_tag, dedent_tag) {
            (Some(indent), Some(dedent)) => Some((indent, dedent)),
            (None, None) => None,
            (Some(lone), None) | (None, Some(lone)) => {
                return Err(LexicalConditionsError::MissingOffside(tags[lone.0].name()).into());
            }
        };

        Ok(Self {
            tags,
            input: input.into(),
            conditions,
            start_position,
            positions,
            terminals: Vec::new(),
            start: None,
            cache,
            offside: Offside::new(),
            log: OnceCell::new(),
        })
    }

    /// Set a log label to debug the lexer; diagnostics print in debug
    /// builds only.
    pub fn set_log(&self, log: Log<&'static str>) -> Result<(), String> {
        self.log
            .set(log)
            .map_err(|err| format!("Log label {} is already assigned.", err))
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn terminal(&self, id: TerminalId) -> &Terminal {
        &self.terminals[id.0]
    }

    /// The accepted input substring of a terminal. Off-side terminals have
    /// an empty value.
    pub fn value(&self, id: TerminalId) -> &str {
        let terminal = &self.terminals[id.0];
        &self.input[self.positions.get(terminal.start).index..self.positions.get(terminal.end).index]
    }

    pub fn position(&self, id: PositionId) -> &Position {
        self.positions.get(id)
    }

    pub fn positions(&self) -> &Positions {
        &self.positions
    }

    pub fn tag_name(&self, tag: TagId) -> &'static str {
        self.tags[tag.0].name()
    }

    /// The memoized follower of `id`, or `None` when it has not been
    /// materialized yet or end of input was reached.
    pub fn memoized_next(&self, id: TerminalId) -> Option<TerminalId> {
        self.terminals[id.0].next.flatten()
    }

    /// Generate the terminal symbol after `current`, memoizing the result.
    ///
    /// Passing `None` yields the first terminal of the input; a `None`
    /// result signals end of input. Repeated calls with the same argument
    /// return the identical handle.
    pub fn next_terminal(
        &mut self,
        current: Option<TerminalId>,
    ) -> Result<Option<TerminalId>, Error> {
        let Some(current) = current else {
            return match self.start {
                Some(memoized) => Ok(memoized),
                None => {
                    let first = self.get_terminal(self.start_position)?;

                    if let Some(first) = first {
                        // The driver works on copies of the starting
                        // position, so the original slot has to be
                        // re-anchored to keep one shared handle
                        let anchored = self.positions.get(self.terminals[first.0].start).clone();
                        self.positions.update(self.start_position, &anchored);
                        self.terminals[first.0].start = self.start_position;
                    }

                    self.start = Some(first);
                    Ok(first)
                }
            };
        };

        match self.terminals[current.0].next {
            Some(memoized) => Ok(memoized),
            None => {
                let end = self.terminals[current.0].end;
                let next = self.get_terminal(end)?;
                self.terminals[current.0].next = Some(next);
                Ok(next)
            }
        }
    }

    /// Generate the terminal symbol at `from`.
    fn get_terminal(&mut self, from: PositionId) -> Result<Option<TerminalId>, Error> {
        if self.positions.get(from).index == self.input.len() {
            let at_eof = self.positions.get(from).clone();
            return self.prepend_offside_terminals(&at_eof, None);
        }

        let mut start_position = self.positions.get(from).clone();
        let mut current_position = start_position.clone();
        let mut accepted_position = start_position.clone();
        let mut current_states: HashMap<TagId, LexingState> = self.cache.states_start.clone();
        let mut next_states: HashMap<TagId, LexingState> = HashMap::new();
        let mut accepted_tags: BTreeSet<TagId> = BTreeSet::new();
        let mut pending_tags: BTreeSet<TagId> = BTreeSet::new();
        let mut last_tags: Vec<TagId> = Vec::new();
        let mut is_offside = false;

        loop {
            while !current_states.is_empty() && current_position.index < self.input.len() {
                let ch = self.input[current_position.index..]
                    .chars()
                    .next()
                    .expect("index is on a character boundary");

                for (&tag, &states) in current_states.iter() {
                    let (state_accept, states) = self.nfa_step(tag, states, ch);

                    if state_accept {
                        pending_tags.insert(tag);
                    }

                    if states != 0 {
                        next_states.insert(tag, states);
                    }
                }

                current_position.advance(ch);

                if !pending_tags.is_empty() {
                    std::mem::swap(&mut accepted_tags, &mut pending_tags);
                    pending_tags.clear();

                    // The off-side NFA has to run at commit time; running
                    // it later would revisit characters discarded by the
                    // longest-match backtracking
                    for (offset, offside_char) in self.input
                        [accepted_position.index..current_position.index]
                        .char_indices()
                    {
                        if self.offside.nfa(offside_char) {
                            // Whether the first non-whitespace character of
                            // the line starts this terminal
                            is_offside |=
                                accepted_position.index + offset == start_position.index;
                        }
                    }

                    accepted_position = current_position.clone();
                }

                std::mem::swap(&mut current_states, &mut next_states);

                // When no NFA can continue, keep the tags of those that got
                // furthest in case an error has to be raised
                if current_states.is_empty()
                    && next_states.len() < self.cache.states_start.len()
                {
                    last_tags.clear();
                    last_tags.extend(next_states.keys().copied());
                }

                next_states.clear();
            }

            if accepted_tags.is_empty() {
                self.log_failure(&start_position);
                return Err(LexicalError::NoTerminalTag {
                    position: start_position,
                    closest_matches: last_tags
                        .iter()
                        .map(|&tag| self.tags[tag.0].name())
                        .collect(),
                }
                .into());
            }

            let frozen: Vec<TagId> = accepted_tags.iter().copied().collect();

            match self.cache.accepted.get(&frozen) {
                Some(refined) => {
                    accepted_tags = refined.clone();
                }
                None => {
                    refine_tags(&self.cache, &mut accepted_tags);

                    for tag in &self.cache.ignore {
                        accepted_tags.remove(tag);
                    }

                    self.cache.accepted.insert(frozen, accepted_tags.clone());
                }
            }

            if !accepted_tags.is_empty() {
                let start = self.positions.insert(start_position.clone());
                let end = self.positions.insert(accepted_position.clone());
                let terminal = self.push_terminal(Terminal {
                    tags: accepted_tags,
                    start,
                    end,
                    next: None,
                });
                self.log_terminal(terminal);

                if is_offside {
                    return self.prepend_offside_terminals(&start_position, Some(terminal));
                }

                return Ok(Some(terminal));
            }

            if current_position.index == self.input.len() {
                return self.prepend_offside_terminals(&start_position, None);
            }

            // Skip the ignored terminal symbol and restart
            start_position = accepted_position.clone();
            current_position = accepted_position.clone();
            current_states = self.cache.states_start.clone();
            last_tags.clear();
            is_offside = false;
        }
    }

    /// One memoized step of a tag's NFA.
    fn nfa_step(&mut self, tag: TagId, states: LexingState, ch: char) -> (bool, LexingState) {
        if let Some(&memoized) = self.cache.nfas.get(&(tag, states, ch)) {
            return memoized;
        }

        let result = self.tags[tag.0].nfa(states, ch);
        self.cache.nfas.insert((tag, states, ch), result);
        result
    }

    /// Detect indentation-level changes and prepend the off-side symbols to
    /// `current`. A `None` current terminal flushes the remaining levels at
    /// end of input.
    fn prepend_offside_terminals(
        &mut self,
        start_position: &Position,
        current: Option<TerminalId>,
    ) -> Result<Option<TerminalId>, Error> {
        let Some((indent_tag, dedent_tag)) = self.cache.offside_tags else {
            return Ok(current);
        };

        let mut current = current;

        match current {
            None => {
                for _ in 1..self.offside.stack.len() {
                    current = Some(self.make_offside_terminal(dedent_tag, start_position, current));
                    self.offside.stack.pop();
                }
            }
            Some(_) => {
                let column = start_position.column;

                if column < self.offside.top() {
                    while column < self.offside.top() {
                        current =
                            Some(self.make_offside_terminal(dedent_tag, start_position, current));
                        self.offside.stack.pop();
                    }

                    if column > self.offside.top() {
                        return Err(
                            LexicalError::IndentationMismatch(start_position.clone()).into()
                        );
                    }
                } else if column > self.offside.top() {
                    current = Some(self.make_offside_terminal(indent_tag, start_position, current));
                    self.offside.stack.push(column);
                }
            }
        }

        Ok(current)
    }

    /// Generate an off-side terminal symbol at `start_position`, linked to
    /// `current`. Off-side terminals are empty-valued: both endpoints are
    /// fresh copies of the same position.
    fn make_offside_terminal(
        &mut self,
        tag: TagId,
        start_position: &Position,
        current: Option<TerminalId>,
    ) -> TerminalId {
        let start = self.positions.insert(start_position.clone());
        let end = self.positions.insert(start_position.clone());
        let terminal = self.push_terminal(Terminal {
            tags: BTreeSet::from([tag]),
            start,
            end,
            next: Some(current),
        });
        self.log_terminal(terminal);
        terminal
    }

    fn push_terminal(&mut self, terminal: Terminal) -> TerminalId {
        self.terminals.push(terminal);
        TerminalId(self.terminals.len() - 1)
    }

    fn log_terminal(&self, _terminal: TerminalId) {
        #[cfg(debug_assertions)]
        if let Some(log) = self.log.get() {
            if log.order() >= Log::Success(()).order() {
                let names: Vec<&str> = self.terminals[_terminal.0]
                    .tags
                    .iter()
                    .map(|&tag| self.tags[tag.0].name())
                    .collect();
                println!(
                    "[{}; Lexeme]: {:?} {:?} at {}",
                    log,
                    names,
                    self.value(_terminal),
                    self.positions.get(self.terminals[_terminal.0].start)
                );
            }
        }
    }

    fn log_failure(&self, _position: &Position) {
        #[cfg(debug_assertions)]
        if let Some(log) = self.log.get() {
            if log.order() >= Log::Default(()).order() {
                println!("[{}; LexemeError]: at {}", log, _position);
            }
        }
    }
}

/// Refine the accepted tag set: transitively add the positive closures,
/// then transitively remove the negative closures.
fn refine_tags(cache: &LexerCache, accepted_tags: &mut BTreeSet<TagId>) {
    let mut current: Vec<TagId> = accepted_tags.iter().copied().collect();

    while !current.is_empty() {
        let mut added = Vec::new();

        for tag in &current {
            for &positive in &cache.positives[tag] {
                if accepted_tags.insert(positive) {
                    added.push(positive);
                }
            }
        }

        current = added;
    }

    let mut negative_tags: BTreeSet<TagId> = BTreeSet::new();
    let mut current: Vec<TagId> = Vec::new();

    for tag in accepted_tags.iter() {
        for &negative in &cache.negatives[tag] {
            if negative_tags.insert(negative) {
                current.push(negative);
            }
        }
    }

    while !current.is_empty() {
        let mut added = Vec::new();

        for tag in &current {
            for &negative in &cache.negatives[tag] {
                if negative_tags.insert(negative) {
                    added.push(negative);
                }
            }
        }

        current = added;
    }

    for negative in &negative_tags {
        accepted_tags.remove(negative);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offside_nfa_accepts_first_nonblank_of_each_line() {
        let mut offside = Offside::new();
        let accepts: Vec<bool> = "a\n  b c\nd".chars().map(|ch| offside.nfa(ch)).collect();

        assert_eq!(
            accepts,
            vec![true, false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn offside_nfa_skips_blank_lines() {
        let mut offside = Offside::new();
        let accepts: Vec<bool> = "\n\n  \n x".chars().map(|ch| offside.nfa(ch)).collect();

        assert_eq!(accepts, vec![false, false, false, false, false, false, true]);
    }
}
