//! Semantic infrastructure over parsing forests and concrete syntax trees.
//!
//! A single traversal skeleton drives both BSR and tree passes: a
//! level-tracked breadth-first descent phase followed by a post-order
//! ascent phase over the nodes the descent kept. Passes are written by
//! implementing [`IBsrVisitor`] or [`ITreeVisitor`] and overriding the
//! hooks they need; the provided `visit` methods run the skeleton. All
//! state lives in the visitor value itself, so a fresh visitor is built per
//! call site.

mod forest;
mod symbol_table;
mod tree;

pub use forest::{
    BsrDisambiguator, BsrFolder, BsrPruner, BsrToTreeConverter, ChooseFn, IBsrFold,
};
pub use symbol_table::{SymbolEntry, SymbolTable};
pub use tree::{
    ITreeFold, NodeId, NonterminalTreeNode, TerminalTreeNode, Tree, TreeFolder, TreeNode,
    TreePositionFixer, TreePositionUnfixer, TreeToBsrConverter, TreeTransformer,
};

use std::collections::VecDeque;

use crate::bsr::{Bsr, BsrKeyHead};
use crate::error::Error;
use crate::lexical::Lexer;
use crate::syntactic::Epn;

/// A pass over a [`Bsr`].
///
/// `descend` receives each EPN set on the way down and may prune a branch
/// by returning an empty list; `ascend` receives the surviving sets in
/// post-order once `bottom` has approved the ascent phase. The order of
/// EPNs within one set is unspecified and passes must not rely on it.
pub trait IBsrVisitor {
    fn top_before(&mut self, _bsr: &Bsr, _lexer: &Lexer) -> Result<(), Error> {
        Ok(())
    }

    fn descend(
        &mut self,
        _bsr: &Bsr,
        _lexer: &Lexer,
        epns: Vec<Epn>,
        _level_changed: bool,
    ) -> Result<Vec<Epn>, Error> {
        Ok(epns)
    }

    /// Called between the phases; returning `false` skips the ascent.
    fn bottom(&mut self, _bsr: &Bsr, _lexer: &Lexer) -> Result<bool, Error> {
        Ok(false)
    }

    fn ascend(
        &mut self,
        _bsr: &Bsr,
        _lexer: &Lexer,
        _epns: Vec<Epn>,
        _level_changed: bool,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn top_after(&mut self, _bsr: &Bsr, _lexer: &Lexer) -> Result<(), Error> {
        Ok(())
    }

    /// Run the traversal skeleton from `bsr.start`. A BSR without a start
    /// key is left unvisited.
    fn visit(&mut self, bsr: &Bsr, lexer: &Lexer) -> Result<(), Error> {
        let Some((start_type, start, end)) = bsr.start else {
            return Ok(());
        };
        let root_epns: Vec<Epn> = match bsr.get(&(BsrKeyHead::Type(start_type), start, end)) {
            Some(epns) if !epns.is_empty() => epns.iter().cloned().collect(),
            _ => return Ok(()),
        };

        let mut descend_queue: VecDeque<Vec<Epn>> = VecDeque::from([root_epns]);
        let mut ascend_stack: Vec<Vec<Epn>> = Vec::new();
        let mut descend_queue_levels = [1usize, 0usize];
        let mut ascend_stack_levels: Vec<usize> = vec![1];
        self.top_before(bsr, lexer)?;

        while let Some(epns) = descend_queue.pop_front() {
            let mut level_changed = false;

            if descend_queue_levels[0] == 0 {
                level_changed = true;
                descend_queue_levels[0] = descend_queue_levels[1];
                descend_queue_levels[1] = 0;
                ascend_stack_levels.push(descend_queue_levels[0]);
            }

            descend_queue_levels[0] -= 1;
            let epns = self.descend(bsr, lexer, epns, level_changed)?;

            if epns.is_empty() {
                if let Some(last) = ascend_stack_levels.last_mut() {
                    *last -= 1;

                    if *last == 0 {
                        ascend_stack_levels.pop();
                    }
                }

                continue;
            }

            for epn in &epns {
                let left_children: Vec<Epn> = bsr.left_children(epn).into_iter().collect();
                let right_children: Vec<Epn> =
                    bsr.right_children(epn, lexer).into_iter().collect();

                if !left_children.is_empty() {
                    descend_queue.push_back(left_children);
                    descend_queue_levels[1] += 1;
                }

                if !right_children.is_empty() {
                    descend_queue.push_back(right_children);
                    descend_queue_levels[1] += 1;
                }
            }

            ascend_stack.push(epns);
        }

        if !self.bottom(bsr, lexer)? {
            return Ok(());
        }

        while let Some(epns) = ascend_stack.pop() {
            let mut level_changed = false;

            if ascend_stack_levels.last() == Some(&0) {
                level_changed = true;
                ascend_stack_levels.pop();
            }

            if let Some(last) = ascend_stack_levels.last_mut() {
                *last -= 1;
            }

            self.ascend(bsr, lexer, epns, level_changed)?;
        }

        self.top_after(bsr, lexer)
    }
}

/// A pass over a [`Tree`].
///
/// Same skeleton as [`IBsrVisitor`], with single nodes instead of EPN sets;
/// `descend` prunes a branch by returning `None`. Hooks receive the tree
/// mutably, so tree passes edit in place.
pub trait ITreeVisitor {
    fn top_before(&mut self, _tree: &mut Tree, _lexer: &Lexer, _root: NodeId) -> Result<(), Error> {
        Ok(())
    }

    fn descend(
        &mut self,
        _tree: &mut Tree,
        _lexer: &Lexer,
        node: NodeId,
        _level_changed: bool,
    ) -> Result<Option<NodeId>, Error> {
        Ok(Some(node))
    }

    /// Called between the phases; returning `false` skips the ascent.
    fn bottom(&mut self, _tree: &mut Tree, _lexer: &Lexer, _root: NodeId) -> Result<bool, Error> {
        Ok(false)
    }

    fn ascend(
        &mut self,
        _tree: &mut Tree,
        _lexer: &Lexer,
        _node: NodeId,
        _level_changed: bool,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn top_after(&mut self, _tree: &mut Tree, _lexer: &Lexer, _root: NodeId) -> Result<(), Error> {
        Ok(())
    }

    /// Run the traversal skeleton from `root`.
    fn visit(&mut self, tree: &mut Tree, root: NodeId, lexer: &Lexer) -> Result<(), Error> {
        let mut descend_queue: VecDeque<NodeId> = VecDeque::from([root]);
        let mut ascend_stack: Vec<NodeId> = Vec::new();
        let mut descend_queue_levels = [1usize, 0usize];
        let mut ascend_stack_levels: Vec<usize> = vec![1];
        self.top_before(tree, lexer, root)?;

        while let Some(node) = descend_queue.pop_front() {
            let mut level_changed = false;

            if descend_queue_levels[0] == 0 {
                level_changed = true;
                descend_queue_levels[0] = descend_queue_levels[1];
                descend_queue_levels[1] = 0;
                ascend_stack_levels.push(descend_queue_levels[0]);
            }

            descend_queue_levels[0] -= 1;

            let Some(node) = self.descend(tree, lexer, node, level_changed)? else {
                if let Some(last) = ascend_stack_levels.last_mut() {
                    *last -= 1;

                    if *last == 0 {
                        ascend_stack_levels.pop();
                    }
                }

                continue;
            };

            ascend_stack.push(node);

            if let TreeNode::Nonterminal(nonterminal) = tree.node(node) {
                descend_queue.extend(nonterminal.children.iter().copied());
                descend_queue_levels[1] += nonterminal.children.len();
            }
        }

        if !self.bottom(tree, lexer, root)? {
            return Ok(());
        }

        while let Some(node) = ascend_stack.pop() {
            let mut level_changed = false;

            if ascend_stack_levels.last() == Some(&0) {
                level_changed = true;
                ascend_stack_levels.pop();
            }

            if let Some(last) = ascend_stack_levels.last_mut() {
                *last -= 1;
            }

            self.ascend(tree, lexer, node, level_changed)?;
        }

        self.top_after(tree, lexer, root)
    }
}
