//! Language forest (lang_forest) is a library to build the front-end of a
//! language processor: a conditional, ambiguity-tolerant tokenizer coupled
//! with a generalized recursive descent parser whose output is a Binary
//! Subtree Representation ([BSR](Bsr)) of the parse forest.
//!
//! # Overview
//!
//! Grammars are not compiled from a separate definition language. A
//! grammar is ordinary Rust: each terminal tag implements
//! [`ITerminalTag`] (one NFA step over an opaque state mask) and each
//! nonterminal type implements [`INonterminalType`] (a `descend` method
//! that calls back into [`Parser::derive`] for every alternative of its
//! production rules). Both kinds of descriptor consult a runtime
//! [`Conditions`] bitset, so one grammar can enable and disable tags,
//! types and alternatives per run without being rebuilt.
//!
//! # Design
//!
//! The [`Lexer`] drives every active tag's NFA simultaneously with
//! longest-match acceptance, refines ambiguous accepted tag sets through
//! transitive positive/negative closures, applies the off-side rule
//! (synthetic indent/dedent terminals) and materializes terminals lazily
//! into a memoized linked list, so the parser only pays for the input it
//! actually consults.
//!
//! The [`Parser`] tolerates ambiguity as a first-class condition: instead
//! of committing to one derivation it records every valid one as
//! [extended packed nodes](Epn) in the [`Bsr`]. Left recursion, direct or
//! indirect, needs no grammar rewriting: the left-recursive SCCs of the
//! FIRST graph are precomputed and the parser alternates descent with
//! iterative ascent inside them.
//!
//! The [`semantic`] module traverses the forest: pruning, disambiguation,
//! folds, BSR↔tree conversion and position fixing are all built on one
//! level-tracked descent/ascent visitor skeleton.
//!
//! # Example
//!
//! A left-recursive sum grammar, parsed and converted to a concrete
//! syntax tree:
//!
//! ```
//! use std::collections::{BTreeSet, HashSet};
//! use std::rc::Rc;
//!
//! use lang_forest::lexeme::PatternTag;
//! use lang_forest::semantic::BsrToTreeConverter;
//! use lang_forest::{
//!     Ascend, Conditions, DeriveError, INonterminalType, ITerminalTag, Lexer, NtId, Parser,
//!     ParsingState, Symbol, TagId,
//! };
//!
//! const NUMBER: TagId = TagId(0);
//! const PLUS: TagId = TagId(1);
//!
//! const EXPR: NtId = NtId(0);
//! const OPERAND: NtId = NtId(1);
//!
//! // Expr ::= Expr "+" Operand | Operand
//! struct Expr;
//!
//! impl INonterminalType for Expr {
//!     fn name(&self) -> &'static str {
//!         "Expr"
//!     }
//!
//!     fn start(&self, _conditions: Conditions) -> bool {
//!         true
//!     }
//!
//!     fn first(&self, _conditions: Conditions) -> BTreeSet<NtId> {
//!         BTreeSet::from([EXPR, OPERAND])
//!     }
//!
//!     fn descend(
//!         &self,
//!         parser: &mut Parser,
//!         current_state: &ParsingState,
//!     ) -> Result<HashSet<ParsingState>, DeriveError> {
//!         let seed = HashSet::from([current_state.clone()]);
//!         let mut next_states = HashSet::new();
//!
//!         let summed = parser
//!             .derive(Symbol::Nonterminal(EXPR), &seed, Ascend::Caller(EXPR))
//!             .and_then(|states| parser.derive(Symbol::Terminal(PLUS), &states, Ascend::Auto))
//!             .and_then(|states| {
//!                 parser.derive(Symbol::Nonterminal(OPERAND), &states, Ascend::Auto)
//!             });
//!
//!         match summed {
//!             Ok(states) => next_states.extend(states),
//!             Err(DeriveError::Derivation) => {}
//!             Err(fatal) => return Err(fatal),
//!         }
//!
//!         match parser.derive(Symbol::Nonterminal(OPERAND), &seed, Ascend::Caller(EXPR)) {
//!             Ok(states) => next_states.extend(states),
//!             Err(DeriveError::Derivation) => {}
//!             Err(fatal) => return Err(fatal),
//!         }
//!
//!         if next_states.is_empty() {
//!             return Err(DeriveError::Derivation);
//!         }
//!
//!         Ok(next_states)
//!     }
//! }
//!
//! // Operand ::= Number
//! struct Operand;
//!
//! impl INonterminalType for Operand {
//!     fn name(&self) -> &'static str {
//!         "Operand"
//!     }
//!
//!     fn descend(
//!         &self,
//!         parser: &mut Parser,
//!         current_state: &ParsingState,
//!     ) -> Result<HashSet<ParsingState>, DeriveError> {
//!         parser.derive(
//!             Symbol::Terminal(NUMBER),
//!             &HashSet::from([current_state.clone()]),
//!             Ascend::Auto,
//!         )
//!     }
//! }
//!
//! let tags: Vec<Rc<dyn ITerminalTag>> = vec![
//!     Rc::new(PatternTag::new("Number", "[0-9]+").unwrap()),
//!     Rc::new(PatternTag::new("Plus", r"\+").unwrap()),
//!     Rc::new(PatternTag::new("Space", "[\\t ]+").unwrap().ignored()),
//! ];
//! let lexer = Lexer::new("sum.calc", "1 + 2 + 3", 0, tags).unwrap();
//! let mut parser = Parser::new(lexer, vec![Rc::new(Expr), Rc::new(Operand)]).unwrap();
//! parser.parse().unwrap();
//!
//! let (tree, root) = BsrToTreeConverter::new()
//!     .convert(&parser.bsr, &parser.lexer)
//!     .unwrap();
//! let root = root.unwrap();
//!
//! // The sum associates to the left: ((1 + 2) + 3)
//! assert_eq!(tree.nonterminal(root).ty, EXPR);
//! assert_eq!(tree.nonterminal(root).children.len(), 3);
//! assert_eq!(tree.nonterminal(tree.child(root, 0)).ty, EXPR);
//! ```

mod bsr;
mod error;
pub mod examples;
pub mod lexeme;
mod lexical;
mod position;
mod scc;
pub mod semantic;
mod syntactic;

use std::collections::{BTreeSet, HashSet};
use std::fmt::{Display, Formatter};

pub use bsr::{Bsr, BsrKey, BsrKeyHead};
pub use error::{
    Error, LexicalConditionsError, LexicalError, SemanticError, SyntacticConditionsError,
    SyntacticError, Warning,
};
pub use lexical::{Lexer, Terminal, TerminalId};
pub use position::{Position, PositionId, Positions};
pub use scc::compute_sccs;
pub use syntactic::{Ascend, DeriveError, Epn, Parser, ParsingState};

/// Runtime condition flags selecting grammar variants. Tags, types and
/// individual alternatives may consult the bitset to enable or disable
/// themselves per run.
pub type Conditions = u64;

/// An opaque mask of live NFA states; `0` means no NFA can continue. The
/// lexer never inspects individual bits, it only threads masks through
/// [`ITerminalTag::nfa`].
pub type LexingState = u64;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
/// Handle of a terminal tag: its index in the tag registry passed to
/// [`Lexer::new`].
pub struct TagId(pub usize);

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
/// Handle of a nonterminal type: its index in the type registry passed to
/// [`Parser::new`].
pub struct NtId(pub usize);

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
/// One element of a derivation string.
pub enum Symbol {
    Terminal(TagId),
    Nonterminal(NtId),
}

/// Definition and implementation of a terminal tag.
///
/// A tag aggregates everything needed to recognize one terminal: the NFA
/// for its regular language and the predicates that select and classify it
/// under the runtime conditions. Tags participate in lexical analysis iff
/// [`start`](ITerminalTag::start) holds.
pub trait ITerminalTag {
    /// Display name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Mask of the starting NFA states. The default marks the first state.
    fn states_start(&self) -> LexingState {
        1
    }

    /// Whether the tag is included in lexical analysis.
    fn start(&self, _conditions: Conditions) -> bool {
        true
    }

    /// Whether accepted input is dropped instead of producing a terminal.
    /// Useful for non-significant whitespace and comments.
    fn ignore(&self, _conditions: Conditions) -> bool {
        false
    }

    /// Whether this tag denotes indentation. An indenting tag is excluded
    /// from NFA lexing; the lexer emits its terminals while applying the
    /// off-side rule.
    fn indent(&self, _conditions: Conditions) -> bool {
        false
    }

    /// Whether this tag denotes dedentation. See
    /// [`indent`](ITerminalTag::indent).
    fn dedent(&self, _conditions: Conditions) -> bool {
        false
    }

    /// Tags added to any terminal symbol carrying this tag. The closure is
    /// transitive and introduces ambiguity deliberately, to circumvent the
    /// limits of longest-match tokenization.
    fn positives(&self, _conditions: Conditions) -> BTreeSet<TagId> {
        BTreeSet::new()
    }

    /// Tags removed from any terminal symbol carrying this tag. The
    /// closure is transitive; a common use is separating keywords from
    /// identifiers.
    fn negatives(&self, _conditions: Conditions) -> BTreeSet<TagId> {
        BTreeSet::new()
    }

    /// One step of the NFA: consume `ch` from the states in
    /// `current_states`, returning whether the input so far is accepted
    /// and the next state mask (`0` when the automaton dies).
    fn nfa(&self, current_states: LexingState, ch: char) -> (bool, LexingState);
}

/// Definition and implementation of a nonterminal type.
///
/// A type aggregates everything needed to derive one nonterminal: the
/// recursive descent over its production rules and the declarations the
/// parser needs to precompute left-recursion data. Exactly one type must
/// be the starting symbol under the active conditions.
pub trait INonterminalType {
    /// Display name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this type is the starting symbol.
    fn start(&self, _conditions: Conditions) -> bool {
        false
    }

    /// The nonterminal types appearing first in this type's production
    /// rules. Used to detect left-recursions.
    fn first(&self, _conditions: Conditions) -> BTreeSet<NtId> {
        BTreeSet::new()
    }

    /// Recursively descend the production rules, deriving every viable
    /// alternative from `current_state` via [`Parser::derive`].
    fn descend(
        &self,
        parser: &mut Parser,
        current_state: &ParsingState,
    ) -> Result<HashSet<ParsingState>, DeriveError>;

    /// Recursively ascend the production rules to handle left-recursion,
    /// re-deriving this type's ascend parents. One failing parent must not
    /// block the others.
    fn ascend(
        &self,
        parser: &mut Parser,
        me: NtId,
        current_state: &ParsingState,
    ) -> Result<(), Error> {
        let current_states = HashSet::from([current_state.clone()]);

        for ascend_parent in parser.ascend_parents(me) {
            match parser.derive(
                Symbol::Nonterminal(ascend_parent),
                &current_states,
                Ascend::Force(true),
            ) {
                Ok(_) | Err(DeriveError::Derivation) => {}
                Err(DeriveError::Fatal(error)) => return Err(error),
            }
        }

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// Debug log levels assignable to the lexer and the parser.
pub enum Log<T> {
    None,
    Default(T),
    Success(T),
    Result(T),
    Verbose(T),
}

impl<T> Log<T> {
    /// Numeric order of the log level.
    pub fn order(&self) -> u8 {
        match self {
            Log::None => 0,
            Log::Default(_) => 1,
            Log::Success(_) => 2,
            Log::Result(_) => 3,
            Log::Verbose(_) => 4,
        }
    }
}

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Log::None => Ok(()),
            Log::Default(label) | Log::Success(label) | Log::Result(label) | Log::Verbose(label) => {
                write!(f, "{}", label)
            }
        }
    }
}
