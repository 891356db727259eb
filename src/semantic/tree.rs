use std::borrow::Cow;
use std::collections::VecDeque;
use std::io;

use ptree::TreeItem;

use crate::bsr::Bsr;
use crate::error::Error;
use crate::lexical::{Lexer, TerminalId};
use crate::position::PositionId;
use crate::semantic::ITreeVisitor;
use crate::syntactic::{Epn, Parser, ParsingState};
use crate::{NtId, Symbol, TagId};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
/// A stable handle to a node of a [`Tree`] arena.
pub struct NodeId(pub(crate) usize);

/// Leaf node covering one terminal symbol.
#[derive(Debug, Clone)]
pub struct TerminalTreeNode {
    pub tag: TagId,
    pub start_position: PositionId,
    pub end_terminal: TerminalId,
}

/// Internal node covering one nonterminal derivation. Children are ordered
/// left to right.
#[derive(Debug, Clone)]
pub struct NonterminalTreeNode {
    pub ty: NtId,
    pub start_position: PositionId,
    pub end_terminal: TerminalId,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum TreeNode {
    Terminal(TerminalTreeNode),
    Nonterminal(NonterminalTreeNode),
}

/// Arena owning the nodes of one or more concrete syntax trees.
///
/// Tree nodes are separate from the parser's BSR: converters allocate into
/// an arena of their own, and all structure is expressed through [`NodeId`]
/// handles.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: TreeNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Number of nodes allocated in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    /// The node as a nonterminal; panics when it is a leaf.
    pub fn nonterminal(&self, id: NodeId) -> &NonterminalTreeNode {
        match &self.nodes[id.0] {
            TreeNode::Nonterminal(node) => node,
            TreeNode::Terminal(_) => panic!("tree node {:?} is not a nonterminal", id),
        }
    }

    pub fn nonterminal_mut(&mut self, id: NodeId) -> &mut NonterminalTreeNode {
        match &mut self.nodes[id.0] {
            TreeNode::Nonterminal(node) => node,
            TreeNode::Terminal(_) => panic!("tree node {:?} is not a nonterminal", id),
        }
    }

    /// The node as a terminal leaf; panics when it is a nonterminal.
    pub fn terminal(&self, id: NodeId) -> &TerminalTreeNode {
        match &self.nodes[id.0] {
            TreeNode::Terminal(node) => node,
            TreeNode::Nonterminal(_) => panic!("tree node {:?} is not a terminal", id),
        }
    }

    /// Child `index` of a nonterminal node.
    pub fn child(&self, id: NodeId, index: usize) -> NodeId {
        self.nonterminal(id).children[index]
    }

    /// The grammar symbol a node derives.
    pub fn symbol(&self, id: NodeId) -> Symbol {
        match &self.nodes[id.0] {
            TreeNode::Terminal(node) => Symbol::Terminal(node.tag),
            TreeNode::Nonterminal(node) => Symbol::Nonterminal(node.ty),
        }
    }

    pub fn start_of(&self, id: NodeId) -> PositionId {
        match &self.nodes[id.0] {
            TreeNode::Terminal(node) => node.start_position,
            TreeNode::Nonterminal(node) => node.start_position,
        }
    }

    pub fn end_terminal_of(&self, id: NodeId) -> TerminalId {
        match &self.nodes[id.0] {
            TreeNode::Terminal(node) => node.end_terminal,
            TreeNode::Nonterminal(node) => node.end_terminal,
        }
    }

    pub fn set_start(&mut self, id: NodeId, start_position: PositionId) {
        match &mut self.nodes[id.0] {
            TreeNode::Terminal(node) => node.start_position = start_position,
            TreeNode::Nonterminal(node) => node.start_position = start_position,
        }
    }

    /// Pretty-print the tree rooted at `root` to standard output.
    pub fn print(&self, root: NodeId, parser: &Parser) -> io::Result<()> {
        ptree::print_tree(&TreeView {
            tree: self,
            parser,
            node: root,
        })
    }
}

#[derive(Clone)]
struct TreeView<'t> {
    tree: &'t Tree,
    parser: &'t Parser,
    node: NodeId,
}

impl<'t> TreeItem for TreeView<'t> {
    type Child = TreeView<'t>;

    fn write_self<W: io::Write>(&self, f: &mut W, _: &ptree::Style) -> io::Result<()> {
        match self.tree.node(self.node) {
            TreeNode::Terminal(node) => write!(
                f,
                "{} {:?}",
                self.parser.lexer.tag_name(node.tag),
                self.parser.lexer.value(node.end_terminal)
            ),
            TreeNode::Nonterminal(node) => write!(f, "{}", self.parser.type_name(node.ty)),
        }
    }

    fn children(&self) -> Cow<[Self::Child]> {
        match self.tree.node(self.node) {
            TreeNode::Nonterminal(node) => Cow::Owned(
                node.children
                    .iter()
                    .map(|&child| TreeView {
                        tree: self.tree,
                        parser: self.parser,
                        node: child,
                    })
                    .collect(),
            ),
            TreeNode::Terminal(_) => Cow::Owned(Vec::new()),
        }
    }
}

/// A tree pass that builds a replacement root and swaps it in with
/// [`apply`](TreeTransformer::apply).
#[derive(Debug, Default)]
pub struct TreeTransformer {
    pub new_root: Option<NodeId>,
}

impl TreeTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the visited root with the replacement, so handles to the
    /// old root observe the new content.
    pub fn apply(&mut self, tree: &mut Tree, root: NodeId) {
        if let Some(new_root) = self.new_root {
            let content = tree.node(new_root).clone();
            *tree.node_mut(root) = content;
            self.new_root = Some(root);
        }
    }
}

impl ITreeVisitor for TreeTransformer {
    fn top_before(&mut self, _tree: &mut Tree, _lexer: &Lexer, _root: NodeId) -> Result<(), Error> {
        self.new_root = None;
        Ok(())
    }
}

/// Post-order pass restoring every node's start position: a leaf starts at
/// its terminal, an internal node at its first child.
pub struct TreePositionFixer;

impl ITreeVisitor for TreePositionFixer {
    fn bottom(&mut self, _tree: &mut Tree, _lexer: &Lexer, _root: NodeId) -> Result<bool, Error> {
        Ok(true)
    }

    fn ascend(
        &mut self,
        tree: &mut Tree,
        lexer: &Lexer,
        node: NodeId,
        _level_changed: bool,
    ) -> Result<(), Error> {
        match tree.node(node) {
            TreeNode::Nonterminal(nonterminal) => {
                if let Some(&first) = nonterminal.children.first() {
                    let start_position = tree.start_of(first);
                    tree.set_start(node, start_position);
                }
            }
            TreeNode::Terminal(terminal) => {
                let start_position = lexer.terminal(terminal.end_terminal).start;
                tree.set_start(node, start_position);
            }
        }

        Ok(())
    }
}

/// Pre-order pass spreading parent start positions down: the first child
/// starts where its parent starts, every later child where its left sibling
/// ends. Required before a tree→BSR conversion, whose keys rely on the
/// resulting shared handles.
pub struct TreePositionUnfixer;

impl ITreeVisitor for TreePositionUnfixer {
    fn descend(
        &mut self,
        tree: &mut Tree,
        lexer: &Lexer,
        node: NodeId,
        _level_changed: bool,
    ) -> Result<Option<NodeId>, Error> {
        if let TreeNode::Nonterminal(nonterminal) = tree.node(node) {
            let children = nonterminal.children.clone();
            let parent_start = nonterminal.start_position;

            if let Some(&first) = children.first() {
                tree.set_start(first, parent_start);
            }

            for index in 1..children.len() {
                let previous_end = lexer.terminal(tree.end_terminal_of(children[index - 1])).end;
                tree.set_start(children[index], previous_end);
            }
        }

        Ok(Some(node))
    }
}

/// Accumulation steps of a post-order fold over a tree.
///
/// A [`TreeFolder`] wires an implementation into the traversal skeleton and
/// collects the per-node values bottom-up. Returning `None` drops a value
/// from its parent's `children` argument without aborting the fold.
pub trait ITreeFold {
    type Output;

    fn fold_internal(
        &mut self,
        tree: &Tree,
        lexer: &Lexer,
        node: NodeId,
        children: Vec<Self::Output>,
    ) -> Result<Option<Self::Output>, Error>;

    fn fold_external(
        &mut self,
        tree: &Tree,
        lexer: &Lexer,
        node: NodeId,
    ) -> Result<Option<Self::Output>, Error>;
}

/// Runs an [`ITreeFold`] over a tree.
pub struct TreeFolder<F: ITreeFold> {
    inner: F,
    queue: VecDeque<Option<F::Output>>,
}

impl<F: ITreeFold> TreeFolder<F> {
    pub fn new(fold: F) -> Self {
        Self {
            inner: fold,
            queue: VecDeque::new(),
        }
    }

    /// Visit the tree and return the root's accumulated value.
    pub fn fold(
        &mut self,
        tree: &mut Tree,
        root: NodeId,
        lexer: &Lexer,
    ) -> Result<Option<F::Output>, Error> {
        self.visit(tree, root, lexer)?;
        Ok(self.queue.pop_front().flatten())
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: ITreeFold> ITreeVisitor for TreeFolder<F> {
    fn top_before(&mut self, _tree: &mut Tree, _lexer: &Lexer, _root: NodeId) -> Result<(), Error> {
        self.queue.clear();
        Ok(())
    }

    fn bottom(&mut self, _tree: &mut Tree, _lexer: &Lexer, _root: NodeId) -> Result<bool, Error> {
        Ok(true)
    }

    fn ascend(
        &mut self,
        tree: &mut Tree,
        lexer: &Lexer,
        node: NodeId,
        _level_changed: bool,
    ) -> Result<(), Error> {
        let child_count = match tree.node(node) {
            TreeNode::Nonterminal(nonterminal) => Some(nonterminal.children.len()),
            TreeNode::Terminal(_) => None,
        };

        let folded = match child_count {
            Some(count) => {
                let from = self.queue.len().saturating_sub(count);
                let children: Vec<F::Output> = if count > 0 {
                    self.queue.split_off(from).into_iter().flatten().collect()
                } else {
                    Vec::new()
                };
                self.inner.fold_internal(tree, lexer, node, children)?
            }
            None => self.inner.fold_external(tree, lexer, node)?,
        };

        self.queue.push_front(folded);
        Ok(())
    }
}

/// Convert a concrete syntax tree back into a [`Bsr`].
///
/// Emits one typed EPN per nonterminal node plus one intermediate EPN per
/// proper prefix of its children. Positions are unfixed before emission so
/// the generated keys chain through shared handles, and re-fixed
/// afterwards.
#[derive(Debug, Default)]
pub struct TreeToBsrConverter {
    pub bsr: Bsr,
}

impl TreeToBsrConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert the tree rooted at `root`, returning the BSR.
    pub fn convert(mut self, tree: &mut Tree, root: NodeId, lexer: &Lexer) -> Result<Bsr, Error> {
        self.visit(tree, root, lexer)?;
        Ok(self.bsr)
    }
}

impl ITreeVisitor for TreeToBsrConverter {
    fn top_before(&mut self, tree: &mut Tree, lexer: &Lexer, root: NodeId) -> Result<(), Error> {
        if self.bsr.start.is_some() || !self.bsr.is_empty() {
            self.bsr = Bsr::new();
        }

        let nonterminal = tree.nonterminal(root);
        self.bsr.start = Some((
            nonterminal.ty,
            nonterminal.start_position,
            lexer.terminal(nonterminal.end_terminal).end,
        ));

        TreePositionUnfixer.visit(tree, root, lexer)
    }

    fn descend(
        &mut self,
        tree: &mut Tree,
        lexer: &Lexer,
        node: NodeId,
        _level_changed: bool,
    ) -> Result<Option<NodeId>, Error> {
        if let TreeNode::Nonterminal(nonterminal) = tree.node(node) {
            let nonterminal = nonterminal.clone();
            let string: Vec<Symbol> = nonterminal
                .children
                .iter()
                .map(|&child| tree.symbol(child))
                .collect();
            let split_position = match nonterminal.children.last() {
                Some(&last) => tree.start_of(last),
                None => nonterminal.start_position,
            };

            self.bsr.add(
                Epn {
                    ty: Some(nonterminal.ty),
                    state: ParsingState {
                        string: string.clone(),
                        start_position: nonterminal.start_position,
                        split_position,
                        end_terminal: Some(nonterminal.end_terminal),
                    },
                },
                lexer,
            );

            for index in 0..nonterminal.children.len().saturating_sub(1) {
                let child = nonterminal.children[index];
                self.bsr.add(
                    Epn {
                        ty: None,
                        state: ParsingState {
                            string: string[..index + 1].to_vec(),
                            start_position: nonterminal.start_position,
                            split_position: tree.start_of(child),
                            end_terminal: Some(tree.end_terminal_of(child)),
                        },
                    },
                    lexer,
                );
            }
        }

        Ok(Some(node))
    }

    fn bottom(&mut self, tree: &mut Tree, lexer: &Lexer, root: NodeId) -> Result<bool, Error> {
        TreePositionFixer.visit(tree, root, lexer)?;
        Ok(false)
    }
}
