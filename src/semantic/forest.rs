use std::collections::VecDeque;

use crate::bsr::Bsr;
use crate::error::{Error, SemanticError};
use crate::lexical::Lexer;
use crate::semantic::tree::{
    NonterminalTreeNode, TerminalTreeNode, Tree, TreeNode, TreePositionFixer,
};
use crate::semantic::{IBsrVisitor, ITreeVisitor, NodeId};
use crate::syntactic::Epn;
use crate::Symbol;

/// A BSR transformer retaining only the EPNs reachable from the start key.
///
/// Visit, then [`apply`](BsrPruner::apply) to swap the pruned forest into
/// the original BSR.
#[derive(Debug, Default)]
pub struct BsrPruner {
    pub new_bsr: Bsr,
}

impl BsrPruner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, bsr: &mut Bsr) {
        bsr.replace_from(&mut self.new_bsr);
    }
}

impl IBsrVisitor for BsrPruner {
    fn top_before(&mut self, bsr: &Bsr, _lexer: &Lexer) -> Result<(), Error> {
        self.new_bsr = Bsr::new();
        self.new_bsr.start = bsr.start;
        Ok(())
    }

    fn descend(
        &mut self,
        _bsr: &Bsr,
        lexer: &Lexer,
        epns: Vec<Epn>,
        _level_changed: bool,
    ) -> Result<Vec<Epn>, Error> {
        for epn in &epns {
            self.new_bsr.add(epn.clone(), lexer);
        }

        Ok(epns)
    }
}

/// Signature of a disambiguation choice: pick the surviving EPN of an
/// ambiguous set.
pub type ChooseFn = fn(&Bsr, &Lexer, &[Epn]) -> Result<Epn, Error>;

fn reject_ambiguity(_bsr: &Bsr, lexer: &Lexer, epns: &[Epn]) -> Result<Epn, Error> {
    Err(SemanticError::AmbiguousGrammar(
        lexer.position(epns[0].state.start_position).clone(),
    )
    .into())
}

/// A BSR transformer keeping exactly one EPN per set.
///
/// [`strict`](BsrDisambiguator::strict) fails on any set of size greater
/// than one; [`with_choice`](BsrDisambiguator::with_choice) delegates the
/// decision. Visit, then [`apply`](BsrDisambiguator::apply).
pub struct BsrDisambiguator<F = ChooseFn> {
    pub new_bsr: Bsr,
    choose: F,
}

impl BsrDisambiguator<ChooseFn> {
    /// A disambiguator that raises
    /// [`AmbiguousGrammar`](SemanticError::AmbiguousGrammar) at the first
    /// ambiguous EPN set.
    pub fn strict() -> Self {
        Self {
            new_bsr: Bsr::new(),
            choose: reject_ambiguity,
        }
    }
}

impl<F: FnMut(&Bsr, &Lexer, &[Epn]) -> Result<Epn, Error>> BsrDisambiguator<F> {
    pub fn with_choice(choose: F) -> Self {
        Self {
            new_bsr: Bsr::new(),
            choose,
        }
    }

    pub fn apply(&mut self, bsr: &mut Bsr) {
        bsr.replace_from(&mut self.new_bsr);
    }
}

impl<F: FnMut(&Bsr, &Lexer, &[Epn]) -> Result<Epn, Error>> IBsrVisitor for BsrDisambiguator<F> {
    fn top_before(&mut self, bsr: &Bsr, _lexer: &Lexer) -> Result<(), Error> {
        self.new_bsr = Bsr::new();
        self.new_bsr.start = bsr.start;
        Ok(())
    }

    fn descend(
        &mut self,
        bsr: &Bsr,
        lexer: &Lexer,
        epns: Vec<Epn>,
        _level_changed: bool,
    ) -> Result<Vec<Epn>, Error> {
        let epn = if epns.len() > 1 {
            (self.choose)(bsr, lexer, &epns)?
        } else {
            epns[0].clone()
        };

        self.new_bsr.add(epn.clone(), lexer);
        Ok(vec![epn])
    }
}

/// Accumulation steps of a post-order fold over a BSR.
///
/// A [`BsrFolder`] wires an implementation into the traversal skeleton.
/// Each visited EPN set folds to a list of values; internal nodes receive
/// their left and right children's surviving values in separate buckets.
pub trait IBsrFold {
    type Output;

    fn fold_internal(
        &mut self,
        bsr: &Bsr,
        lexer: &Lexer,
        epn: &Epn,
        left_children: Vec<Self::Output>,
        right_children: Vec<Self::Output>,
    ) -> Result<Option<Self::Output>, Error>;

    fn fold_external(
        &mut self,
        bsr: &Bsr,
        lexer: &Lexer,
        epn: &Epn,
    ) -> Result<Option<Self::Output>, Error>;
}

/// Runs an [`IBsrFold`] over a BSR.
pub struct BsrFolder<F: IBsrFold> {
    inner: F,
    queue: VecDeque<Vec<Option<F::Output>>>,
}

impl<F: IBsrFold> BsrFolder<F> {
    pub fn new(fold: F) -> Self {
        Self {
            inner: fold,
            queue: VecDeque::new(),
        }
    }

    /// Visit the BSR and return the start set's accumulated values.
    pub fn fold(&mut self, bsr: &Bsr, lexer: &Lexer) -> Result<Vec<Option<F::Output>>, Error> {
        self.visit(bsr, lexer)?;
        Ok(self.queue.pop_front().unwrap_or_default())
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: IBsrFold> IBsrVisitor for BsrFolder<F> {
    fn top_before(&mut self, _bsr: &Bsr, _lexer: &Lexer) -> Result<(), Error> {
        self.queue.clear();
        Ok(())
    }

    fn bottom(&mut self, _bsr: &Bsr, _lexer: &Lexer) -> Result<bool, Error> {
        Ok(true)
    }

    fn ascend(
        &mut self,
        bsr: &Bsr,
        lexer: &Lexer,
        epns: Vec<Epn>,
        _level_changed: bool,
    ) -> Result<(), Error> {
        let mut fold = Vec::with_capacity(epns.len());

        for epn in &epns {
            let has_left = !bsr.left_children(epn).is_empty();
            let has_right = !bsr.right_children(epn, lexer).is_empty();

            if has_left || has_right {
                let right_children: Vec<F::Output> = if has_right {
                    self.queue
                        .pop_back()
                        .expect("right child group folds before its parent")
                        .into_iter()
                        .flatten()
                        .collect()
                } else {
                    Vec::new()
                };
                let left_children: Vec<F::Output> = if has_left {
                    self.queue
                        .pop_back()
                        .expect("left child group folds before its parent")
                        .into_iter()
                        .flatten()
                        .collect()
                } else {
                    Vec::new()
                };

                fold.push(self.inner.fold_internal(
                    bsr,
                    lexer,
                    epn,
                    left_children,
                    right_children,
                )?);
            } else {
                fold.push(self.inner.fold_external(bsr, lexer, epn)?);
            }
        }

        self.queue.push_front(fold);
        Ok(())
    }
}

/// Convert a disambiguated BSR into a concrete syntax tree.
///
/// Allocates one nonterminal node per typed EPN, attaches children in
/// left-then-right order and synthesizes the terminal leaf of any state
/// whose split and end positions differ; the finished tree has its
/// positions fixed. The converter follows the first EPN of every set, so
/// ambiguous sets must be resolved first.
#[derive(Debug, Default)]
pub struct BsrToTreeConverter {
    pub tree: Tree,
    pub root: Option<NodeId>,
    parents: VecDeque<NodeId>,
}

impl BsrToTreeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert `bsr`, returning the node arena and the root handle (`None`
    /// for an empty forest).
    pub fn convert(mut self, bsr: &Bsr, lexer: &Lexer) -> Result<(Tree, Option<NodeId>), Error> {
        self.visit(bsr, lexer)?;
        Ok((self.tree, self.root))
    }
}

impl IBsrVisitor for BsrToTreeConverter {
    fn top_before(&mut self, _bsr: &Bsr, _lexer: &Lexer) -> Result<(), Error> {
        self.tree = Tree::new();
        self.root = None;
        self.parents.clear();
        Ok(())
    }

    fn descend(
        &mut self,
        bsr: &Bsr,
        lexer: &Lexer,
        epns: Vec<Epn>,
        _level_changed: bool,
    ) -> Result<Vec<Epn>, Error> {
        let parent = self.parents.pop_front();
        let epn = &epns[0];
        let end_terminal = epn
            .state
            .end_terminal
            .expect("visited EPNs always end at a terminal");

        let parent = match epn.ty {
            Some(ty) => {
                let node = self.tree.push(TreeNode::Nonterminal(NonterminalTreeNode {
                    ty,
                    start_position: epn.state.start_position,
                    end_terminal,
                    children: Vec::new(),
                }));

                match parent {
                    Some(parent) => {
                        let first_child = self.tree.nonterminal(parent).children.first().copied();
                        let after_first = first_child.is_some_and(|first| {
                            lexer.position(self.tree.start_of(first)).index
                                < lexer.position(epn.state.start_position).index
                        });
                        let index = if after_first { 1 } else { 0 };
                        self.tree.nonterminal_mut(parent).children.insert(index, node);
                    }
                    None => self.root = Some(node),
                }

                node
            }
            None => parent.expect("intermediate EPNs always have a parent"),
        };

        if !bsr.left_children(epn).is_empty() {
            self.parents.push_back(parent);
        }

        if !bsr.right_children(epn, lexer).is_empty() {
            self.parents.push_back(parent);
        } else if epn.state.split_position != lexer.terminal(end_terminal).end {
            let Some(&Symbol::Terminal(tag)) = epn.state.string.last() else {
                panic!("a synthesized leaf requires the state to end in a terminal tag");
            };
            let leaf = self.tree.push(TreeNode::Terminal(TerminalTreeNode {
                tag,
                start_position: epn.state.split_position,
                end_terminal,
            }));
            self.tree.nonterminal_mut(parent).children.insert(0, leaf);
        }

        Ok(epns)
    }

    fn bottom(&mut self, _bsr: &Bsr, lexer: &Lexer) -> Result<bool, Error> {
        if let Some(root) = self.root {
            TreePositionFixer.visit(&mut self.tree, root, lexer)?;
        }

        Ok(false)
    }
}
