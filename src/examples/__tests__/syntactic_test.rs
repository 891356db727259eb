use std::collections::HashSet;
use std::rc::Rc;

use crate::examples::ambiguous::ambiguous_parser;
use crate::examples::blocks::{blocks_lexer, DEDENT, IDENT, INDENT};
use crate::examples::calc::{calc_parser, calc_tags, Expr, Operand, EXPR, NUMBER, OPERAND};
use crate::examples::mutual::{mutual_parser, CHAIN, LINK};
use crate::{
    Ascend, BsrKeyHead, Conditions, DeriveError, Error, INonterminalType, Lexer, LexicalError,
    NtId, Parser, ParsingState, Symbol, SyntacticConditionsError, SyntacticError,
};

const SINGLE: NtId = NtId(0);

/// A grammar deriving exactly one number.
struct Single;

impl INonterminalType for Single {
    fn name(&self) -> &'static str {
        "Single"
    }

    fn start(&self, _conditions: Conditions) -> bool {
        true
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

fn single_parser(input: &str) -> Parser {
    let lexer = Lexer::new("single.calc", input, 0, calc_tags()).unwrap();
    Parser::new(lexer, vec![Rc::new(Single)]).unwrap()
}

fn parsed_span(parser: &Parser) -> (usize, usize) {
    let (_, start, end) = parser.bsr.start.expect("a completed derivation");
    (
        parser.lexer.position(start).index,
        parser.lexer.position(end).index,
    )
}

#[test]
fn direct_left_recursion_derives_the_whole_input() {
    let mut parser = calc_parser("1+2+3");
    parser.parse().unwrap();

    let (start_type, _, _) = parser.bsr.start.unwrap();
    assert_eq!(start_type, EXPR);
    assert_eq!(parsed_span(&parser), (0, 5));
}

#[test]
fn ignored_terminals_do_not_disturb_parsing() {
    let mut parser = calc_parser("1 + 2 + 3");
    parser.parse().unwrap();

    assert_eq!(parsed_span(&parser), (0, 9));
}

#[test]
fn indirect_left_recursion_derives_the_whole_input() {
    for (input, span) in [("y", (0, 1)), ("yzx", (0, 3)), ("yzxzx", (0, 5))] {
        let mut parser = mutual_parser(input);

        match parser.parse() {
            Ok(()) => assert_eq!(parsed_span(&parser), span),
            Err(error) => panic!("failed to parse {:?}: {}", input, error),
        }
    }
}

#[test]
fn a_trailing_unparseable_terminal_is_reported() {
    let mut parser = calc_parser("1+2+");

    match parser.parse() {
        Err(Error::Syntactic(SyntacticError::NoDerivation(position))) => {
            assert_eq!((position.line, position.column), (1, 4));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn input_beyond_the_derivation_is_reported() {
    let mut parser = single_parser("1 2");

    match parser.parse() {
        Err(Error::Syntactic(SyntacticError::NoDerivation(position))) => {
            assert_eq!((position.line, position.column), (1, 3));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn lexical_errors_surface_through_parse() {
    let mut parser = calc_parser("1+x");

    match parser.parse() {
        Err(Error::Lexical(LexicalError::NoTerminalTag { position, .. })) => {
            assert_eq!((position.line, position.column), (1, 3));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn empty_input_parses_to_an_empty_forest() {
    let mut parser = calc_parser("");
    parser.parse().unwrap();
    assert!(parser.bsr.start.is_none());
}

#[test]
fn ignored_only_input_parses_to_an_empty_forest() {
    let mut parser = calc_parser("   ");
    parser.parse().unwrap();
    assert!(parser.bsr.start.is_none());
}

#[test]
fn ambiguous_derivations_share_one_epn_set() {
    let mut parser = ambiguous_parser("aaa");
    parser.parse().unwrap();

    let (start_type, start, end) = parser.bsr.start.unwrap();
    let epns = parser
        .bsr
        .get(&(BsrKeyHead::Type(start_type), start, end))
        .unwrap();
    assert_eq!(epns.len(), 2);
}

#[test]
fn left_recursion_is_detected_per_scc() {
    let calc = calc_parser("1");
    assert!(calc.is_left_recursive(EXPR));
    assert!(!calc.is_left_recursive(OPERAND));
    assert_eq!(calc.ascend_parents(EXPR), vec![EXPR]);
    assert!(calc.ascend_parents(OPERAND).is_empty());

    let mutual = mutual_parser("y");
    assert!(mutual.is_left_recursive(CHAIN));
    assert!(mutual.is_left_recursive(LINK));
    assert_eq!(mutual.ascend_parents(CHAIN), vec![LINK]);
    assert_eq!(mutual.ascend_parents(LINK), vec![CHAIN]);

    let single = single_parser("1");
    assert!(!single.is_left_recursive(SINGLE));
}

#[test]
fn the_starting_symbol_must_be_unique() {
    let lexer = Lexer::new("starts.calc", "1", 0, calc_tags()).unwrap();
    let missing = Parser::new(lexer, vec![Rc::new(Operand)]);
    assert!(matches!(
        missing.err(),
        Some(Error::SyntacticConditions(SyntacticConditionsError::NoStart))
    ));

    let lexer = Lexer::new("starts.calc", "1", 0, calc_tags()).unwrap();
    let doubled = Parser::new(lexer, vec![Rc::new(Expr), Rc::new(Expr)]);
    assert!(matches!(
        doubled.err(),
        Some(Error::SyntacticConditions(
            SyntacticConditionsError::MultipleStarts("Expr")
        ))
    ));
}

const PROG: NtId = NtId(0);

/// A fixed-shape off-side program: one header statement and one indented
/// statement.
struct Prog;

impl INonterminalType for Prog {
    fn name(&self) -> &'static str {
        "Prog"
    }

    fn start(&self, _conditions: Conditions) -> bool {
        true
    }

    fn descend(
        &self,
        parser: &mut Parser,
        current_state: &ParsingState,
    ) -> Result<HashSet<ParsingState>, DeriveError> {
        let seed = HashSet::from([current_state.clone()]);

        [IDENT, INDENT, IDENT, DEDENT]
            .into_iter()
            .try_fold(seed, |states, tag| {
                parser.derive(Symbol::Terminal(tag), &states, Ascend::Auto)
            })
    }
}

#[test]
fn offside_terminals_parse_like_any_other() {
    let lexer = blocks_lexer("a\n  b");
    let mut parser = Parser::new(lexer, vec![Rc::new(Prog)]).unwrap();
    parser.parse().unwrap();

    let (start_type, _, _) = parser.bsr.start.unwrap();
    assert_eq!(start_type, PROG);
    assert_eq!(parsed_span(&parser), (0, 5));
}

#[test]
fn terminal_derivation_filters_by_tag() {
    let mut parser = single_parser("1");
    parser.parse().unwrap();

    let (_, start, end) = parser.bsr.start.unwrap();
    let epns = parser
        .bsr
        .get(&(BsrKeyHead::Type(SINGLE), start, end))
        .unwrap();
    assert_eq!(epns.len(), 1);

    let epn = epns.iter().next().unwrap();
    assert_eq!(epn.state.string, vec![Symbol::Terminal(NUMBER)]);
    assert_eq!(epn.ty, Some(SINGLE));
}

#[test]
fn derive_rejects_mismatched_tags() {
    // The number grammar cannot start at a plus sign
    let mut parser = single_parser("+");

    match parser.parse() {
        Err(Error::Syntactic(SyntacticError::NoDerivation(position))) => {
            assert_eq!((position.line, position.column), (1, 1));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
