//! An off-side (indentation-sensitive) statement language, plus a
//! keyword/identifier tag pair whose ambiguity is settled by the
//! positive/negative closures.

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::lexeme::{OffsideTag, PatternTag};
use crate::{Conditions, ITerminalTag, Lexer, LexingState, TagId};

pub const IDENT: TagId = TagId(0);
pub const SPACE: TagId = TagId(1);
pub const COMMENT: TagId = TagId(2);
pub const INDENT: TagId = TagId(3);
pub const DEDENT: TagId = TagId(4);

pub fn blocks_lexer(input: &str) -> Lexer {
    Lexer::new(
        "main.blocks",
        input,
        0,
        vec![
            Rc::new(PatternTag::new("Ident", "[a-z][a-z0-9]*").unwrap()),
            Rc::new(PatternTag::new("Space", "[\\t\\n ]+").unwrap().ignored()),
            Rc::new(PatternTag::new("Comment", "#[^\\n]*").unwrap().ignored()),
            Rc::new(OffsideTag::indent("Indent")),
            Rc::new(OffsideTag::dedent("Dedent")),
        ],
    )
    .unwrap()
}

/// With this flag set, the `if` keyword additionally carries the
/// identifier tag instead of suppressing it, so keywords remain usable as
/// identifiers.
pub const LENIENT_KEYWORDS: Conditions = 1 << 0;

pub const KW_IF: TagId = TagId(0);
pub const KW_IDENT: TagId = TagId(1);
pub const KW_SPACE: TagId = TagId(2);

/// The `if` keyword, written against the raw NFA interface: state 1 is the
/// start, state 2 has seen `i`, and `f` accepts with no live state left.
pub struct IfKeyword;

impl ITerminalTag for IfKeyword {
    fn name(&self) -> &'static str {
        "If"
    }

    fn positives(&self, conditions: Conditions) -> BTreeSet<TagId> {
        if conditions & LENIENT_KEYWORDS != 0 {
            BTreeSet::from([KW_IDENT])
        } else {
            BTreeSet::new()
        }
    }

    fn negatives(&self, conditions: Conditions) -> BTreeSet<TagId> {
        if conditions & LENIENT_KEYWORDS == 0 {
            BTreeSet::from([KW_IDENT])
        } else {
            BTreeSet::new()
        }
    }

    fn nfa(&self, current_states: LexingState, ch: char) -> (bool, LexingState) {
        let mut state_accept = false;
        let mut next_states: LexingState = 0;

        if 1 << 0 & current_states != 0 && ch == 'i' {
            next_states |= 1 << 1;
        }

        if 1 << 1 & current_states != 0 && ch == 'f' {
            state_accept = true;
        }

        (state_accept, next_states)
    }
}

pub fn keyword_lexer(input: &str, conditions: Conditions) -> Lexer {
    Lexer::new(
        "keywords.blocks",
        input,
        conditions,
        vec![
            Rc::new(IfKeyword),
            Rc::new(PatternTag::new("Ident", "[a-z]+").unwrap()),
            Rc::new(PatternTag::new("Space", "[\\t ]+").unwrap().ignored()),
        ],
    )
    .unwrap()
}
