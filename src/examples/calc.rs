//! A left-recursive sum grammar over integers.
//!
//! ```text
//! Expr    ::= Expr "+" Operand | Operand
//! Operand ::= Number
//! ```

use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;

use crate::lexeme::PatternTag;
use crate::{
    Ascend, Conditions, DeriveError, INonterminalType, ITerminalTag, Lexer, NtId, Parser,
    ParsingState, Symbol, TagId,
};

pub const NUMBER: TagId = TagId(0);
pub const PLUS: TagId = TagId(1);
pub const SPACE: TagId = TagId(2);

pub const EXPR: NtId = NtId(0);
pub const OPERAND: NtId = NtId(1);

pub struct Expr;

impl INonterminalType for Expr {
    fn name(&self) -> &'static str {
        "Expr"
    }

    fn start(&self, _conditions: Conditions) -> bool {
        true
    }

    fn first(&self, _conditions: Conditions) -> BTreeSet<NtId> {
        BTreeSet::from([EXPR, OPERAND])
    }

    fn descend(
        &self,
        parser: &mut Parser,
        current_state: &ParsingState,
    ) -> Result<HashSet<ParsingState>, DeriveError> {
        let seed = HashSet::from([current_state.clone()]);
        let mut next_states = HashSet::new();

        // Expr "+" Operand
        let summed = parser
            .derive(Symbol::Nonterminal(EXPR), &seed, Ascend::Caller(EXPR))
            .and_then(|states| parser.derive(Symbol::Terminal(PLUS), &states, Ascend::Auto))
            .and_then(|states| parser.derive(Symbol::Nonterminal(OPERAND), &states, Ascend::Auto));

        match summed {
            Ok(states) => next_states.extend(states),
            Err(DeriveError::Derivation) => {}
            Err(fatal) => return Err(fatal),
        }

        // Operand
        match parser.derive(Symbol::Nonterminal(OPERAND), &seed, Ascend::Caller(EXPR)) {
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

pub struct Operand;

impl INonterminalType for Operand {
    fn name(&self) -> &'static str {
        "Operand"
    }

    fn descend(
        &self,
        parser: &mut Parser,
        current_state: &ParsingState,
    ) -> Result<HashSet<ParsingState>, DeriveError> {
        parser.derive(
            Symbol::Terminal(NUMBER),
            &HashSet::from([current_state.clone()]),
            Ascend::Auto,
        )
    }
}

pub fn calc_tags() -> Vec<Rc<dyn ITerminalTag>> {
    vec![
        Rc::new(PatternTag::new("Number", "[0-9]+").unwrap()),
        Rc::new(PatternTag::new("Plus", r"\+").unwrap()),
        Rc::new(PatternTag::new("Space", "[\\t ]+").unwrap().ignored()),
    ]
}

pub fn calc_parser(input: &str) -> Parser {
    let lexer = Lexer::new("sum.calc", input, 0, calc_tags()).unwrap();
    Parser::new(lexer, vec![Rc::new(Expr), Rc::new(Operand)]).unwrap()
}

pub const FLOAT_NUMBER: TagId = TagId(0);
pub const FLOAT_DOT: TagId = TagId(1);
pub const FLOAT_FLOAT: TagId = TagId(2);

/// A lexer whose fixed-point literal overlaps its integer and dot tokens,
/// exercising longest-match backtracking.
pub fn float_lexer(input: &str) -> Lexer {
    Lexer::new(
        "literals.calc",
        input,
        0,
        vec![
            Rc::new(PatternTag::new("Number", "[0-9]+").unwrap()),
            Rc::new(PatternTag::new("Dot", r"\.").unwrap()),
            Rc::new(PatternTag::new("Float", r"[0-9]+\.[0-9]+").unwrap()),
        ],
    )
    .unwrap()
}
