use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::bsr::{Bsr, BsrKeyHead};
use crate::error::{Error, SyntacticConditionsError, SyntacticError};
use crate::lexical::{Lexer, TerminalId};
use crate::position::PositionId;
use crate::scc::compute_sccs;
use crate::{INonterminalType, Log, NtId, Symbol, TagId};

/// BSR parsing state: a node in an indexed binary derivation tree,
/// binarized from the left.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsingState {
    /// Terminal tags and nonterminal types derived so far from the
    /// production rule.
    pub string: Vec<Symbol>,
    /// Ending position of the previous state, or the starting position for
    /// a seed state.
    pub start_position: PositionId,
    /// Ending position of the left children.
    pub split_position: PositionId,
    /// Ending terminal symbol of the right children, or `None` for a seed
    /// state.
    pub end_terminal: Option<TerminalId>,
}

/// BSR Extended Packed Node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Epn {
    /// Nonterminal type whose derivation produced the state, or `None` for
    /// an intermediate (binarized) node.
    pub ty: Option<NtId>,
    pub state: ParsingState,
}

/// Whether [`Parser::derive`] recursively ascends after growing a
/// left-recursive nonterminal's memo.
#[derive(Debug, Clone, Copy)]
pub enum Ascend {
    /// Decide at runtime from the callee's left-recursion membership.
    Auto,
    /// Decide at runtime knowing the calling nonterminal type. Required
    /// when caller and callee may belong to the same left-recursion SCC,
    /// where an unconditional ascent would recurse forever.
    Caller(NtId),
    /// Use the given decision unconditionally.
    Force(bool),
}

/// Failure of a single derivation attempt.
#[derive(Debug)]
pub enum DeriveError {
    /// Could not derive any production rule. Internal control flow for
    /// exploring alternatives; never escapes [`Parser::parse`].
    Derivation,
    /// Fatal analysis error from the underlying lexer or a user action.
    Fatal(Error),
}

impl From<Error> for DeriveError {
    fn from(error: Error) -> Self {
        DeriveError::Fatal(error)
    }
}

/// Main syntactic analysis implementation.
///
/// The parser performs a generalized recursive descent over the terminal
/// stream its [`Lexer`] produces on demand, deriving every alternative and
/// packing the resulting derivations into a [`Bsr`]. Direct and indirect
/// left recursion is handled without grammar rewriting: the left-recursive
/// SCCs of the FIRST graph are precomputed and descent alternates with
/// iterative ascent inside them.
pub struct Parser {
    nonterminal_types: Vec<Rc<dyn INonterminalType>>,
    pub lexer: Lexer,
    /// Binary subtree representation of the parsing forest.
    pub bsr: Bsr,
    start_type: NtId,
    /// FIRST sets restricted to the member's own left-recursive SCC.
    first_in_scc: HashMap<NtId, HashSet<NtId>>,
    /// Inverse of `first_in_scc`: the types to re-derive when a member's
    /// memo grows.
    ascend_parents: HashMap<NtId, Vec<NtId>>,
    /// Furthest terminal symbol consulted so far.
    eoi: Option<TerminalId>,
    /// End terminals already derived per nonterminal type and position.
    memo: HashMap<(NtId, PositionId), HashSet<TerminalId>>,
    log: OnceCell<Log<&'static str>>,
}

impl Parser {
    /// Create a parser over `lexer` for the given nonterminal types.
    ///
    /// Fails unless exactly one type is the starting symbol under the
    /// lexer's conditions.
    pub fn new(
        lexer: Lexer,
        nonterminal_types: Vec<Rc<dyn INonterminalType>>,
    ) -> Result<Self, Error> {
        let conditions = lexer.conditions;
        let mut start_type = None;
        let mut first: HashMap<NtId, HashSet<NtId>> = HashMap::new();

        for (index, nonterminal) in nonterminal_types.iter().enumerate() {
            let id = NtId(index);

            if nonterminal.start(conditions) {
                if start_type.is_some() {
                    return Err(
                        SyntacticConditionsError::MultipleStarts(nonterminal.name()).into()
                    );
                }

                start_type = Some(id);
            }

            first.insert(id, nonterminal.first(conditions).into_iter().collect());
        }

        let Some(start_type) = start_type else {
            return Err(SyntacticConditionsError::NoStart.into());
        };

        let mut first_in_scc = HashMap::new();
        let mut ascend_parents = HashMap::new();

        for scc in compute_sccs(&first) {
            if scc.len() == 1 {
                if let Some(only) = scc.iter().next() {
                    // A single node without a self-loop is not a
                    // left-recursion
                    if !first.get(only).is_some_and(|f| f.contains(only)) {
                        continue;
                    }
                }
            }

            for &member in &scc {
                first_in_scc.insert(
                    member,
                    scc.iter()
                        .copied()
                        .filter(|other| {
                            first.get(&member).is_some_and(|f| f.contains(other))
                        })
                        .collect::<HashSet<_>>(),
                );
                ascend_parents.insert(
                    member,
                    scc.iter()
                        .copied()
                        .filter(|other| first.get(other).is_some_and(|f| f.contains(&member)))
                        .collect::<Vec<_>>(),
                );
            }
        }

        Ok(Self {
            nonterminal_types,
            lexer,
            bsr: Bsr::new(),
            start_type,
            first_in_scc,
            ascend_parents,
            eoi: None,
            memo: HashMap::new(),
            log: OnceCell::new(),
        })
    }

    /// Set a log label to debug the parser; diagnostics print in debug
    /// builds only.
    pub fn set_log(&self, log: Log<&'static str>) -> Result<(), String> {
        self.log
            .set(log)
            .map_err(|err| format!("Log label {} is already assigned.", err))
    }

    pub fn start_type(&self) -> NtId {
        self.start_type
    }

    pub fn type_name(&self, nonterminal: NtId) -> &'static str {
        self.nonterminal_types[nonterminal.0].name()
    }

    /// Ascend parents of `nonterminal` within its left-recursive SCC.
    pub fn ascend_parents(&self, nonterminal: NtId) -> Vec<NtId> {
        self.ascend_parents
            .get(&nonterminal)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `nonterminal` belongs to a left-recursive SCC.
    pub fn is_left_recursive(&self, nonterminal: NtId) -> bool {
        self.first_in_scc.contains_key(&nonterminal)
    }

    /// Perform syntactic analysis on the whole input, populating
    /// [`bsr`](Parser::bsr) with every derivation.
    pub fn parse(&mut self) -> Result<(), Error> {
        let seed = ParsingState {
            string: Vec::new(),
            start_position: self.lexer.start_position,
            split_position: self.lexer.start_position,
            end_terminal: None,
        };

        match self.derive(
            Symbol::Nonterminal(self.start_type),
            &HashSet::from([seed]),
            Ascend::Auto,
        ) {
            Ok(_) | Err(DeriveError::Derivation) => {}
            Err(DeriveError::Fatal(error)) => return Err(error),
        }

        // The input was empty or held only ignored terminals
        let Some(eoi) = self.eoi else {
            return Ok(());
        };

        let end_position = self.lexer.terminal(eoi).end;
        let key = (
            BsrKeyHead::Type(self.start_type),
            self.lexer.start_position,
            end_position,
        );

        if self.bsr.get(&key).is_none() {
            let position = self.lexer.position(self.lexer.terminal(eoi).start).clone();
            return Err(SyntacticError::NoDerivation(position).into());
        }

        // The input continues after what was derived
        if let Some(beyond) = self.lexer.next_terminal(Some(eoi))? {
            let position = self
                .lexer
                .position(self.lexer.terminal(beyond).start)
                .clone();
            return Err(SyntacticError::NoDerivation(position).into());
        }

        self.bsr.start = Some((self.start_type, self.lexer.start_position, end_position));
        Ok(())
    }

    /// Try to derive `symbol` from every state in `current_states`.
    ///
    /// Fails with [`DeriveError::Derivation`] when no state survives the
    /// extension.
    pub fn derive(
        &mut self,
        symbol: Symbol,
        current_states: &HashSet<ParsingState>,
        ascend: Ascend,
    ) -> Result<HashSet<ParsingState>, DeriveError> {
        let mut next_states = HashSet::new();

        match symbol {
            Symbol::Terminal(tag) => {
                for current_state in current_states {
                    if let Some(next_state) = self.derive_terminal_tag(tag, current_state)? {
                        next_states.insert(next_state);
                    }
                }
            }
            Symbol::Nonterminal(nonterminal) => {
                // Determine at runtime whether to ascend, preventing
                // infinite recursion when both caller and callee belong to
                // the same left-recursion SCC
                let ascend = match ascend {
                    Ascend::Force(flag) => flag,
                    Ascend::Auto => self.first_in_scc.contains_key(&nonterminal),
                    Ascend::Caller(caller) => {
                        self.first_in_scc
                            .get(&caller)
                            .map_or(true, |first| !first.contains(&nonterminal))
                            && self.first_in_scc.contains_key(&nonterminal)
                    }
                };

                for current_state in current_states {
                    next_states
                        .extend(self.derive_nonterminal_type(nonterminal, current_state, ascend)?);
                }
            }
        }

        if next_states.is_empty() {
            return Err(DeriveError::Derivation);
        }

        Ok(next_states)
    }

    /// Try to derive a terminal tag from a single state.
    fn derive_terminal_tag(
        &mut self,
        tag: TagId,
        current_state: &ParsingState,
    ) -> Result<Option<ParsingState>, Error> {
        self.bsr.add(
            Epn {
                ty: None,
                state: current_state.clone(),
            },
            &self.lexer,
        );
        let next_terminal = self.lexer.next_terminal(current_state.end_terminal)?;

        if let Some(next) = next_terminal {
            if Some(next) != self.eoi {
                match self.eoi {
                    None => self.eoi = Some(next),
                    Some(eoi) => {
                        let next_start = self.start_index(next);

                        if next_start > self.start_index(eoi) {
                            self.eoi = Some(next);
                        } else if next_start == self.start_index(eoi) {
                            // When ambiguous lexings share a start index,
                            // prefer the terminal reachable through the
                            // memoized chain to preserve its identity
                            let mut cursor = Some(eoi);

                            while let Some(terminal) = cursor {
                                if terminal == next {
                                    break;
                                }

                                if self.start_index(terminal) != next_start {
                                    cursor = None;
                                    break;
                                }

                                cursor = self.lexer.memoized_next(terminal);
                            }

                            if cursor == Some(next) {
                                self.eoi = Some(next);
                            }
                        }
                    }
                }
            }
        }

        let Some(next) = next_terminal else {
            return Ok(None);
        };

        if !self.lexer.terminal(next).tags.contains(&tag) {
            return Ok(None);
        }

        Ok(Some(ParsingState {
            string: extended(&current_state.string, Symbol::Terminal(tag)),
            start_position: current_state.start_position,
            split_position: self.state_end_position(current_state),
            end_terminal: Some(next),
        }))
    }

    /// Try to derive a nonterminal type from a single state, descending
    /// and, inside left-recursive SCCs, iteratively ascending.
    fn derive_nonterminal_type(
        &mut self,
        nonterminal: NtId,
        current_state: &ParsingState,
        ascend: bool,
    ) -> Result<HashSet<ParsingState>, Error> {
        self.bsr.add(
            Epn {
                ty: None,
                state: current_state.clone(),
            },
            &self.lexer,
        );
        let end_position = self.state_end_position(current_state);

        if ascend || !self.memo.contains_key(&(nonterminal, end_position)) {
            self.memo.entry((nonterminal, end_position)).or_default();
            let initial_memo_len = self.memo[&(nonterminal, end_position)].len();
            let seed = ParsingState {
                string: Vec::new(),
                start_position: end_position,
                split_position: end_position,
                end_terminal: current_state.end_terminal,
            };
            let descended = self.nonterminal_types[nonterminal.0].clone();
            self.log_descend(nonterminal, end_position);

            match descended.descend(self, &seed) {
                Err(DeriveError::Derivation) => {}
                Err(DeriveError::Fatal(error)) => return Err(error),
                Ok(next_states) => {
                    for next_state in next_states {
                        let end_terminal = next_state
                            .end_terminal
                            .expect("a derived nonterminal state always ends at a terminal");
                        self.bsr.add(
                            Epn {
                                ty: Some(nonterminal),
                                state: next_state,
                            },
                            &self.lexer,
                        );
                        self.memo
                            .entry((nonterminal, end_position))
                            .or_default()
                            .insert(end_terminal);
                    }

                    // Only ascend when the descent added end terminals
                    if ascend && initial_memo_len != self.memo[&(nonterminal, end_position)].len()
                    {
                        descended.ascend(self, nonterminal, current_state)?;
                    }
                }
            }
        }

        Ok(self.memo[&(nonterminal, end_position)]
            .iter()
            .map(|&end_terminal| ParsingState {
                string: extended(&current_state.string, Symbol::Nonterminal(nonterminal)),
                start_position: current_state.start_position,
                split_position: end_position,
                end_terminal: Some(end_terminal),
            })
            .collect())
    }

    /// Ending position of a state: its end terminal's end, or the split
    /// position for seed states.
    pub fn state_end_position(&self, state: &ParsingState) -> PositionId {
        match state.end_terminal {
            Some(terminal) => self.lexer.terminal(terminal).end,
            None => state.split_position,
        }
    }

    fn start_index(&self, terminal: TerminalId) -> usize {
        self.lexer.position(self.lexer.terminal(terminal).start).index
    }

    fn log_descend(&self, _nonterminal: NtId, _position: PositionId) {
        #[cfg(debug_assertions)]
        if let Some(log) = self.log.get() {
            if log.order() >= Log::Verbose(()).order() {
                println!(
                    "[{}; Descend]: {} at {}",
                    log,
                    self.type_name(_nonterminal),
                    self.lexer.position(_position)
                );
            }
        }
    }
}

fn extended(string: &[Symbol], symbol: Symbol) -> Vec<Symbol> {
    let mut extended = Vec::with_capacity(string.len() + 1);
    extended.extend_from_slice(string);
    extended.push(symbol);
    extended
}
