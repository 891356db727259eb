use std::collections::BTreeSet;
use std::rc::Rc;

use crate::examples::blocks::{
    blocks_lexer, keyword_lexer, DEDENT, IDENT, INDENT, KW_IDENT, KW_IF, LENIENT_KEYWORDS,
};
use crate::examples::calc::{calc_tags, float_lexer};
use crate::lexeme::{OffsideTag, PatternTag};
use crate::{Error, Lexer, LexicalConditionsError, LexicalError, TagId, TerminalId};

fn collect(lexer: &mut Lexer) -> Vec<TerminalId> {
    let mut terminals = Vec::new();
    let mut current = None;

    loop {
        match lexer.next_terminal(current) {
            Ok(Some(next)) => {
                terminals.push(next);
                current = Some(next);
            }
            Ok(None) => break terminals,
            Err(error) => panic!("unexpected lexical error: {}", error),
        }
    }
}

fn collect_error(lexer: &mut Lexer) -> Error {
    let mut current = None;

    loop {
        match lexer.next_terminal(current) {
            Ok(Some(next)) => current = Some(next),
            Ok(None) => panic!("expected a lexical error"),
            Err(error) => break error,
        }
    }
}

fn values<'l>(lexer: &'l Lexer, terminals: &[TerminalId]) -> Vec<&'l str> {
    terminals.iter().map(|&t| lexer.value(t)).collect()
}

fn tag_sets(lexer: &Lexer, terminals: &[TerminalId]) -> Vec<BTreeSet<TagId>> {
    terminals
        .iter()
        .map(|&t| lexer.terminal(t).tags.clone())
        .collect()
}

fn single_tags(lexer: &Lexer, terminals: &[TerminalId]) -> Vec<TagId> {
    terminals
        .iter()
        .map(|&t| {
            let tags = &lexer.terminal(t).tags;
            assert_eq!(tags.len(), 1, "expected a single tag on {:?}", t);
            *tags.iter().next().unwrap()
        })
        .collect()
}

#[test]
fn keywords_suppress_identifiers() {
    let mut lexer = keyword_lexer("if ifx", 0);
    let terminals = collect(&mut lexer);

    assert_eq!(values(&lexer, &terminals), vec!["if", "ifx"]);
    assert_eq!(
        tag_sets(&lexer, &terminals),
        vec![BTreeSet::from([KW_IF]), BTreeSet::from([KW_IDENT])]
    );
}

#[test]
fn lenient_keywords_keep_the_identifier_tag() {
    let mut lexer = keyword_lexer("if", LENIENT_KEYWORDS);
    let terminals = collect(&mut lexer);

    assert_eq!(
        tag_sets(&lexer, &terminals),
        vec![BTreeSet::from([KW_IF, KW_IDENT])]
    );
}

#[test]
fn longest_match_wins() {
    let mut lexer = float_lexer("12.34");
    let terminals = collect(&mut lexer);

    assert_eq!(values(&lexer, &terminals), vec!["12.34"]);
}

#[test]
fn longest_match_backtracks_to_the_last_accept() {
    let mut lexer = float_lexer("12.");
    let terminals = collect(&mut lexer);

    assert_eq!(values(&lexer, &terminals), vec!["12", "."]);
}

#[test]
fn offside_terminals_are_emitted_on_level_changes() {
    let mut lexer = blocks_lexer("a\n  b\n  c\nd");
    let terminals = collect(&mut lexer);

    assert_eq!(
        single_tags(&lexer, &terminals),
        vec![IDENT, INDENT, IDENT, IDENT, DEDENT, IDENT]
    );
    assert_eq!(values(&lexer, &terminals), vec!["a", "", "b", "c", "", "d"]);
}

#[test]
fn outstanding_levels_are_dedented_at_end_of_input() {
    let mut lexer = blocks_lexer("a\n  b\n    c");
    let terminals = collect(&mut lexer);
    let tags = single_tags(&lexer, &terminals);

    assert_eq!(
        tags,
        vec![IDENT, INDENT, IDENT, INDENT, IDENT, DEDENT, DEDENT]
    );

    let indents = tags.iter().filter(|&&tag| tag == INDENT).count();
    let dedents = tags.iter().filter(|&&tag| tag == DEDENT).count();
    assert_eq!(indents, dedents);
}

#[test]
fn comment_lines_do_not_affect_indentation() {
    let mut lexer = blocks_lexer("a\n  b\n# note\n  c\nd");
    let terminals = collect(&mut lexer);

    assert_eq!(
        single_tags(&lexer, &terminals),
        vec![IDENT, INDENT, IDENT, IDENT, DEDENT, IDENT]
    );
}

#[test]
fn mismatched_indentation_is_an_error() {
    let mut lexer = blocks_lexer("a\n    b\n  c");

    match collect_error(&mut lexer) {
        Error::Lexical(LexicalError::IndentationMismatch(position)) => {
            assert_eq!((position.line, position.column), (3, 3));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn lexing_is_idempotent() {
    let input = "a\n  b\n  c\nd";
    let mut first = blocks_lexer(input);
    let mut second = blocks_lexer(input);
    let first_terminals = collect(&mut first);
    let second_terminals = collect(&mut second);

    let summary = |lexer: &Lexer, terminals: &[TerminalId]| {
        terminals
            .iter()
            .map(|&t| {
                let terminal = lexer.terminal(t);
                let start = lexer.position(terminal.start);
                let end = lexer.position(terminal.end);
                (
                    terminal.tags.clone(),
                    lexer.value(t).to_string(),
                    (start.index, start.line, start.column),
                    (end.index, end.line, end.column),
                )
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(
        summary(&first, &first_terminals),
        summary(&second, &second_terminals)
    );
}

#[test]
fn terminals_are_memoized() {
    let mut lexer = Lexer::new("memo.calc", "1 + 2", 0, calc_tags()).unwrap();

    let first = lexer.next_terminal(None).unwrap();
    assert!(first.is_some());
    assert_eq!(first, lexer.next_terminal(None).unwrap());

    let second = lexer.next_terminal(first).unwrap();
    assert!(second.is_some());
    assert_eq!(second, lexer.next_terminal(first).unwrap());
}

#[test]
fn ignored_tags_never_reach_the_output() {
    use crate::examples::blocks::{COMMENT, SPACE};

    let mut lexer = blocks_lexer("a\n  b c # trailing\nd");
    let terminals = collect(&mut lexer);

    for tags in tag_sets(&lexer, &terminals) {
        assert!(!tags.contains(&SPACE));
        assert!(!tags.contains(&COMMENT));
    }
}

#[test]
fn the_start_position_is_anchored_to_the_first_terminal() {
    let mut lexer = Lexer::new("anchored.calc", "   7", 0, calc_tags()).unwrap();
    let first = lexer.next_terminal(None).unwrap().unwrap();

    assert_eq!(lexer.terminal(first).start, lexer.start_position);
    assert_eq!(lexer.position(lexer.start_position).index, 3);
    assert_eq!(lexer.position(lexer.start_position).column, 4);
}

#[test]
fn unlexable_input_is_an_error() {
    let mut lexer = keyword_lexer("if 9x", 0);

    match collect_error(&mut lexer) {
        Error::Lexical(LexicalError::NoTerminalTag {
            position,
            closest_matches,
        }) => {
            assert_eq!((position.line, position.column), (1, 4));
            assert!(closest_matches.is_empty());
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn the_longest_surviving_tags_are_reported() {
    let mut lexer = Lexer::new(
        "partial.calc",
        "12x",
        0,
        vec![
            Rc::new(PatternTag::new("Float", r"[0-9]+\.[0-9]+").unwrap()),
            Rc::new(PatternTag::new("Dot", r"\.").unwrap()),
        ],
    )
    .unwrap();

    match collect_error(&mut lexer) {
        Error::Lexical(LexicalError::NoTerminalTag {
            position,
            closest_matches,
        }) => {
            assert_eq!(position.index, 0);
            assert_eq!(closest_matches, vec!["Float"]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn conditions_select_the_active_tags() {
    const EXTENDED: u64 = 1 << 4;
    let tags = || -> Vec<Rc<dyn crate::ITerminalTag>> {
        vec![Rc::new(
            PatternTag::new("Number", "[0-9]+").unwrap().when(EXTENDED),
        )]
    };

    let mut disabled = Lexer::new("cond.calc", "7", 0, tags()).unwrap();
    assert!(matches!(
        collect_error(&mut disabled),
        Error::Lexical(LexicalError::NoTerminalTag { .. })
    ));

    let mut enabled = Lexer::new("cond.calc", "7", EXTENDED, tags()).unwrap();
    let terminals = collect(&mut enabled);
    assert_eq!(values(&enabled, &terminals), vec!["7"]);
}

#[test]
fn offside_tags_must_come_in_pairs() {
    let lone = Lexer::new(
        "broken.blocks",
        "",
        0,
        vec![Rc::new(OffsideTag::indent("Indent"))],
    );
    assert!(matches!(
        lone.err(),
        Some(Error::LexicalConditions(
            LexicalConditionsError::MissingOffside("Indent")
        ))
    ));

    let doubled = Lexer::new(
        "broken.blocks",
        "",
        0,
        vec![
            Rc::new(OffsideTag::indent("Indent")),
            Rc::new(OffsideTag::indent("Indent2")),
            Rc::new(OffsideTag::dedent("Dedent")),
        ],
    );
    assert!(matches!(
        doubled.err(),
        Some(Error::LexicalConditions(
            LexicalConditionsError::MultipleIndents("Indent2")
        ))
    ));
}

#[test]
fn lexical_errors_render_with_their_positions() {
    let mut lexer = blocks_lexer("a\n    b\n  c");
    let error = collect_error(&mut lexer);

    assert_eq!(
        error.to_string(),
        "main.blocks:3:3: Lexical Error: Indentation does not match."
    );

    let mut unlexable = Lexer::new(
        "partial.calc",
        "12x",
        0,
        vec![Rc::new(PatternTag::new("Float", r"[0-9]+\.[0-9]+").unwrap())],
    )
    .unwrap();
    let error = collect_error(&mut unlexable);
    assert_eq!(
        error.to_string(),
        "partial.calc:1:1: Lexical Error: Could not derive any terminal tag."
    );
}
