use crate::examples::ambiguous::ambiguous_parser;
use crate::examples::calc::{calc_parser, EXPR, NUMBER, OPERAND};
use crate::semantic::{
    BsrDisambiguator, BsrFolder, BsrPruner, BsrToTreeConverter, IBsrFold, IBsrVisitor, ITreeFold,
    ITreeVisitor, NodeId, Tree, TreeFolder, TreeNode, TreePositionFixer, TreePositionUnfixer,
    TreeToBsrConverter, TreeTransformer,
};
use crate::{Bsr, Epn, Error, Lexer, Parser, SemanticError, Warning};

fn parsed(input: &str) -> Parser {
    let mut parser = calc_parser(input);
    parser.parse().unwrap();
    parser
}

fn converted(parser: &Parser) -> (Tree, NodeId) {
    let (tree, root) = BsrToTreeConverter::new()
        .convert(&parser.bsr, &parser.lexer)
        .unwrap();
    (tree, root.expect("a non-empty forest"))
}

#[test]
fn every_epn_prefix_has_a_left_child() {
    let parser = parsed("1+2+3");

    for (_, epns) in parser.bsr.iter() {
        for epn in epns {
            if epn.state.string.len() >= 2 {
                assert!(
                    !parser.bsr.left_children(epn).is_empty(),
                    "missing left children of {:?}",
                    epn
                );
            }
        }
    }
}

#[test]
fn the_pruner_keeps_only_reachable_epns() {
    let mut parser = parsed("1+2+3");
    let before = parser.bsr.epn_count();

    let mut pruner = BsrPruner::new();
    pruner.visit(&parser.bsr, &parser.lexer).unwrap();
    pruner.apply(&mut parser.bsr);

    assert!(parser.bsr.epn_count() < before);
    assert!(parser.bsr.start.is_some());

    // The pruned forest still converts to the same tree shape
    let (tree, root) = converted(&parser);
    assert_eq!(tree.nonterminal(root).children.len(), 3);
}

#[test]
fn the_strict_disambiguator_rejects_ambiguity() {
    let mut parser = ambiguous_parser("aaa");
    parser.parse().unwrap();

    let mut disambiguator = BsrDisambiguator::strict();
    match disambiguator.visit(&parser.bsr, &parser.lexer) {
        Err(Error::Semantic(SemanticError::AmbiguousGrammar(position))) => {
            assert_eq!((position.line, position.column), (1, 1));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn a_choice_function_resolves_ambiguity() {
    let mut parser = ambiguous_parser("aaa");
    parser.parse().unwrap();

    let mut disambiguator = BsrDisambiguator::with_choice(|_bsr: &Bsr, lexer: &Lexer, epns: &[Epn]| {
        let chosen = epns
            .iter()
            .min_by_key(|epn| lexer.position(epn.state.split_position).index)
            .expect("a non-empty EPN set")
            .clone();
        Ok(chosen)
    });
    disambiguator.visit(&parser.bsr, &parser.lexer).unwrap();
    disambiguator.apply(&mut parser.bsr);

    let (tree, root) = converted(&parser);
    assert_eq!(tree.nonterminal(root).children.len(), 2);
}

#[test]
fn the_converted_tree_nests_to_the_left() {
    let parser = parsed("1+2+3");
    let (tree, root) = converted(&parser);
    tree.print(root, &parser).unwrap();

    // Expr[Expr[Expr[Operand["1"]] "+" Operand["2"]] "+" Operand["3"]]
    let root_node = tree.nonterminal(root);
    assert_eq!(root_node.ty, EXPR);
    assert_eq!(root_node.children.len(), 3);

    let inner = tree.nonterminal(tree.child(root, 0));
    assert_eq!(inner.ty, EXPR);
    assert_eq!(inner.children.len(), 3);

    let innermost = tree.nonterminal(tree.child(tree.child(root, 0), 0));
    assert_eq!(innermost.ty, EXPR);
    assert_eq!(innermost.children.len(), 1);

    let plus = tree.terminal(tree.child(root, 1));
    assert_eq!(parser.lexer.value(plus.end_terminal), "+");

    let operand = tree.nonterminal(tree.child(root, 2));
    assert_eq!(operand.ty, OPERAND);
    let leaf = tree.terminal(tree.child(tree.child(root, 2), 0));
    assert_eq!(parser.lexer.value(leaf.end_terminal), "3");
}

fn isomorphic(a: &Tree, a_node: NodeId, b: &Tree, b_node: NodeId) -> bool {
    match (a.node(a_node), b.node(b_node)) {
        (TreeNode::Terminal(ta), TreeNode::Terminal(tb)) => {
            ta.tag == tb.tag && ta.end_terminal == tb.end_terminal
        }
        (TreeNode::Nonterminal(na), TreeNode::Nonterminal(nb)) => {
            na.ty == nb.ty
                && na.end_terminal == nb.end_terminal
                && na.children.len() == nb.children.len()
                && na
                    .children
                    .iter()
                    .zip(&nb.children)
                    .all(|(&ca, &cb)| isomorphic(a, ca, b, cb))
        }
        _ => false,
    }
}

#[test]
fn trees_round_trip_through_the_bsr() {
    let parser = parsed("1+2+3");
    let (mut tree, root) = converted(&parser);

    let bsr = TreeToBsrConverter::new()
        .convert(&mut tree, root, &parser.lexer)
        .unwrap();
    let (second_tree, second_root) = BsrToTreeConverter::new()
        .convert(&bsr, &parser.lexer)
        .unwrap();
    let second_root = second_root.expect("a non-empty forest");

    assert!(isomorphic(&tree, root, &second_tree, second_root));
}

#[test]
fn unfixing_and_fixing_positions_is_the_identity() {
    let parser = parsed("1+2+3");
    let (mut tree, root) = converted(&parser);

    let starts = |tree: &Tree| -> Vec<_> {
        (0..tree.len()).map(|i| tree.start_of(NodeId(i))).collect()
    };
    let fixed = starts(&tree);

    TreePositionUnfixer.visit(&mut tree, root, &parser.lexer).unwrap();
    let unfixed = starts(&tree);
    assert_ne!(fixed, unfixed);

    TreePositionFixer.visit(&mut tree, root, &parser.lexer).unwrap();
    assert_eq!(fixed, starts(&tree));
}

struct Evaluate;

impl ITreeFold for Evaluate {
    type Output = i64;

    fn fold_internal(
        &mut self,
        _tree: &Tree,
        _lexer: &Lexer,
        _node: NodeId,
        children: Vec<i64>,
    ) -> Result<Option<i64>, Error> {
        Ok(Some(children.iter().sum()))
    }

    fn fold_external(
        &mut self,
        tree: &Tree,
        lexer: &Lexer,
        node: NodeId,
    ) -> Result<Option<i64>, Error> {
        let terminal = tree.terminal(node);

        if terminal.tag == NUMBER {
            Ok(lexer.value(terminal.end_terminal).parse().ok())
        } else {
            Ok(None)
        }
    }
}

#[test]
fn a_tree_fold_evaluates_the_sum() {
    let parser = parsed("1+2+3");
    let (mut tree, root) = converted(&parser);

    let mut folder = TreeFolder::new(Evaluate);
    let sum = folder.fold(&mut tree, root, &parser.lexer).unwrap();

    assert_eq!(sum, Some(6));
}

struct CountEpns;

impl IBsrFold for CountEpns {
    type Output = usize;

    fn fold_internal(
        &mut self,
        _bsr: &Bsr,
        _lexer: &Lexer,
        _epn: &Epn,
        left_children: Vec<usize>,
        right_children: Vec<usize>,
    ) -> Result<Option<usize>, Error> {
        Ok(Some(
            1 + left_children.iter().sum::<usize>() + right_children.iter().sum::<usize>(),
        ))
    }

    fn fold_external(
        &mut self,
        _bsr: &Bsr,
        _lexer: &Lexer,
        _epn: &Epn,
    ) -> Result<Option<usize>, Error> {
        Ok(Some(1))
    }
}

#[test]
fn a_bsr_fold_reaches_every_pruned_epn() {
    let mut parser = parsed("1+2+3");

    let mut pruner = BsrPruner::new();
    pruner.visit(&parser.bsr, &parser.lexer).unwrap();
    pruner.apply(&mut parser.bsr);

    let mut folder = BsrFolder::new(CountEpns);
    let counts = folder.fold(&parser.bsr, &parser.lexer).unwrap();
    let total: usize = counts.into_iter().flatten().sum();

    assert_eq!(total, parser.bsr.epn_count());
}

#[test]
fn the_transformer_swaps_the_new_root_in() {
    let parser = parsed("1+2+3");
    let (mut tree, root) = converted(&parser);

    let mut transformer = TreeTransformer::new();
    transformer.visit(&mut tree, root, &parser.lexer).unwrap();
    assert!(transformer.new_root.is_none());

    transformer.new_root = Some(tree.child(root, 0));
    transformer.apply(&mut tree, root);

    // The root now holds the "1+2" subexpression
    assert_eq!(tree.nonterminal(root).children.len(), 3);
    let end_terminal = tree.nonterminal(root).end_terminal;
    assert_eq!(parser.lexer.value(end_terminal), "2");
}

#[test]
fn an_empty_forest_converts_to_no_tree() {
    let parser = parsed("");
    let (_, root) = BsrToTreeConverter::new()
        .convert(&parser.bsr, &parser.lexer)
        .unwrap();
    assert!(root.is_none());
}

#[test]
fn semantic_diagnostics_render_with_their_positions() {
    let parser = parsed("1+2+3");
    let position = parser.lexer.position(parser.lexer.start_position).clone();

    let error = SemanticError::DuplicateSymbolDefinition {
        position: position.clone(),
        name: "x".to_string(),
        first_position: position.clone(),
    };
    assert_eq!(
        error.to_string(),
        "sum.calc:1:1: Semantic Error: Duplicate definition of symbol 'x', first defined at sum.calc:1:1."
    );

    let warning = Warning::Semantic {
        position,
        description: "unused rule".to_string(),
    };
    assert_eq!(
        warning.to_string(),
        "sum.calc:1:1: Semantic Warning: unused rule"
    );
}
