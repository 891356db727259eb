//! The textbook ambiguous grammar `Run ::= Run Run | "a"`, producing a
//! forest with multiple derivations per span.

use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;

use crate::lexeme::PatternTag;
use crate::{
    Ascend, Conditions, DeriveError, INonterminalType, Lexer, NtId, Parser, ParsingState, Symbol,
    TagId,
};

pub const LETTER: TagId = TagId(0);

pub const RUN: NtId = NtId(0);

pub struct Run;

impl INonterminalType for Run {
    fn name(&self) -> &'static str {
        "Run"
    }

    fn start(&self, _conditions: Conditions) -> bool {
        true
    }

    fn first(&self, _conditions: Conditions) -> BTreeSet<NtId> {
        BTreeSet::from([RUN])
    }

    fn descend(
        &self,
        parser: &mut Parser,
        current_state: &ParsingState,
    ) -> Result<HashSet<ParsingState>, DeriveError> {
        let seed = HashSet::from([current_state.clone()]);
        let mut next_states = HashSet::new();

        // Run Run
        let doubled = parser
            .derive(Symbol::Nonterminal(RUN), &seed, Ascend::Caller(RUN))
            .and_then(|states| parser.derive(Symbol::Nonterminal(RUN), &states, Ascend::Auto));

        match doubled {
            Ok(states) => next_states.extend(states),
            Err(DeriveError::Derivation) => {}
            Err(fatal) => return Err(fatal),
        }

        // "a"
        match parser.derive(Symbol::Terminal(LETTER), &seed, Ascend::Auto) {
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

pub fn ambiguous_parser(input: &str) -> Parser {
    let lexer = Lexer::new(
        "runs.ambiguous",
        input,
        0,
        vec![Rc::new(PatternTag::new("Letter", "a").unwrap())],
    )
    .unwrap();
    Parser::new(lexer, vec![Rc::new(Run)]).unwrap()
}
