use std::collections::{HashMap, HashSet};

use crate::lexical::Lexer;
use crate::position::PositionId;
use crate::syntactic::Epn;
use crate::{NtId, Symbol};

/// First component of a BSR index key: a nonterminal type for complete
/// derivations, or a derivation string for intermediate nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BsrKeyHead {
    Type(NtId),
    String(Vec<Symbol>),
}

/// Index key of an EPN set: head plus starting and ending positions.
pub type BsrKey = (BsrKeyHead, PositionId, PositionId);

/// Binary Subtree Representation of a parsing forest.
///
/// Every valid derivation is compactly encoded as sets of extended packed
/// nodes indexed by symbol-or-string and span; the structure can then be
/// used as a parsing oracle by the semantic passes.
#[derive(Debug, Default)]
pub struct Bsr {
    /// Index of the starting symbol's EPN set, or `None` while parsing has
    /// not completed (or could not derive the input).
    pub start: Option<(NtId, PositionId, PositionId)>,
    epns: HashMap<BsrKey, HashSet<Epn>>,
}

impl Bsr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.epns.is_empty()
    }

    /// Total number of stored EPNs.
    pub fn epn_count(&self) -> usize {
        self.epns.values().map(HashSet::len).sum()
    }

    pub fn get(&self, key: &BsrKey) -> Option<&HashSet<Epn>> {
        self.epns.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BsrKey, &HashSet<Epn>)> {
        self.epns.iter()
    }

    /// Add an EPN to its respective set.
    pub fn add(&mut self, epn: Epn, lexer: &Lexer) {
        let end = match epn.state.end_terminal {
            Some(terminal) => lexer.terminal(terminal).end,
            None => epn.state.split_position,
        };
        let head = match epn.ty {
            Some(ty) => BsrKeyHead::Type(ty),
            None => BsrKeyHead::String(epn.state.string.clone()),
        };

        self.epns
            .entry((head, epn.state.start_position, end))
            .or_default()
            .insert(epn);
    }

    /// Left children of `parent`: the EPN set of its string prefix over the
    /// left half of its span. Empty when the parent has no left half.
    pub fn left_children(&self, parent: &Epn) -> HashSet<Epn> {
        if parent.state.start_position == parent.state.split_position {
            return HashSet::new();
        }

        let Some((_, prefix)) = parent.state.string.split_last() else {
            return HashSet::new();
        };
        let key = (
            BsrKeyHead::String(prefix.to_vec()),
            parent.state.start_position,
            parent.state.split_position,
        );

        self.epns.get(&key).cloned().unwrap_or_default()
    }

    /// Right children of `parent`: the EPN set of its last symbol over the
    /// right half of its span. Empty when the span is collapsed or the last
    /// symbol is a terminal tag.
    pub fn right_children(&self, parent: &Epn, lexer: &Lexer) -> HashSet<Epn> {
        let Some(end_terminal) = parent.state.end_terminal else {
            return HashSet::new();
        };
        let end = lexer.terminal(end_terminal).end;

        if parent.state.split_position == end {
            return HashSet::new();
        }

        let head = match parent.state.string.last() {
            Some(Symbol::Nonterminal(nonterminal)) => BsrKeyHead::Type(*nonterminal),
            _ => return HashSet::new(),
        };
        let key = (head, parent.state.split_position, end);

        self.epns.get(&key).cloned().unwrap_or_default()
    }

    /// Move the contents of `other` into `self`, emptying `other`. Used by
    /// the BSR transformers' `apply` step.
    pub fn replace_from(&mut self, other: &mut Bsr) {
        self.start = other.start;
        self.epns = std::mem::take(&mut other.epns);
    }
}
