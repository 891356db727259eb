//! A pair of mutually left-recursive nonterminals, exercising indirect
//! left recursion through a FIRST-graph SCC of size two.
//!
//! ```text
//! Chain ::= Link "x" | "y"
//! Link  ::= Chain "z"
//! ```

use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;

use crate::lexeme::PatternTag;
use crate::{
    Ascend, Conditions, DeriveError, INonterminalType, Lexer, NtId, Parser, ParsingState, Symbol,
    TagId,
};

pub const X: TagId = TagId(0);
pub const Y: TagId = TagId(1);
pub const Z: TagId = TagId(2);

pub const CHAIN: NtId = NtId(0);
pub const LINK: NtId = NtId(1);

pub struct Chain;

impl INonterminalType for Chain {
    fn name(&self) -> &'static str {
        "Chain"
    }

    fn start(&self, _conditions: Conditions) -> bool {
        true
    }

    fn first(&self, _conditions: Conditions) -> BTreeSet<NtId> {
        BTreeSet::from([LINK])
    }

    fn descend(
        &self,
        parser: &mut Parser,
        current_state: &ParsingState,
    ) -> Result<HashSet<ParsingState>, DeriveError> {
        let seed = HashSet::from([current_state.clone()]);
        let mut next_states = HashSet::new();

        // Link "x"
        let linked = parser
            .derive(Symbol::Nonterminal(LINK), &seed, Ascend::Caller(CHAIN))
            .and_then(|states| parser.derive(Symbol::Terminal(X), &states, Ascend::Auto));

        match linked {
            Ok(states) => next_states.extend(states),
            Err(DeriveError::Derivation) => {}
            Err(fatal) => return Err(fatal),
        }

        // "y"
        match parser.derive(Symbol::Terminal(Y), &seed, Ascend::Auto) {
            Ok(states) => next_states.extend(states),
            Err(DeriveError::Derivation) => {}
            Err(fatal) => return Err(fatal),
        }

        if next_states.is_empty() {
            return Err(DeriveError::Derivation);
        }

        Ok(next_states)
    }
}

pub struct Link;

impl INonterminalType for Link {
    fn name(&self) -> &'static str {
        "Link"
    }

    fn first(&self, _conditions: Conditions) -> BTreeSet<NtId> {
        BTreeSet::from([CHAIN])
    }

    fn descend(
        &self,
        parser: &mut Parser,
        current_state: &ParsingState,
    ) -> Result<HashSet<ParsingState>, DeriveError> {
        let seed = HashSet::from([current_state.clone()]);

        // Chain "z"
        parser
            .derive(Symbol::Nonterminal(CHAIN), &seed, Ascend::Caller(LINK))
            .and_then(|states| parser.derive(Symbol::Terminal(Z), &states, Ascend::Auto))
    }
}

pub fn mutual_parser(input: &str) -> Parser {
    let lexer = Lexer::new(
        "chains.mutual",
        input,
        0,
        vec![
            Rc::new(PatternTag::new("X", "x").unwrap()),
            Rc::new(PatternTag::new("Y", "y").unwrap()),
            Rc::new(PatternTag::new("Z", "z").unwrap()),
        ],
    )
    .unwrap();
    Parser::new(lexer, vec![Rc::new(Chain), Rc::new(Link)]).unwrap()
}
