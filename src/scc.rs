use std::collections::{HashMap, HashSet};
use std::hash::Hash;

struct Frame<T> {
    node: T,
    neighbors: Vec<T>,
    next: usize,
}

/// Tarjan's strongly connected components algorithm.
///
/// The parser uses this to detect left-recursions in a grammar's FIRST
/// graph and separate the recursion cycles into SCCs. The traversal is
/// iterative so grammars with long left-recursive chains cannot overflow
/// the call stack. Nodes referenced as neighbors but absent from the map
/// are treated as sinks.
pub fn compute_sccs<T: Copy + Eq + Hash>(graph: &HashMap<T, HashSet<T>>) -> Vec<HashSet<T>> {
    // Index of visited nodes
    let mut visited_index: HashMap<T, usize> = HashMap::new();
    // Smallest index in stack reachable from nodes
    let mut min_index: HashMap<T, usize> = HashMap::new();
    let mut stack: Vec<T> = Vec::new();
    let mut on_stack: HashSet<T> = HashSet::new();
    let mut sccs: Vec<HashSet<T>> = Vec::new();

    let visit = |v: T,
                     frames: &mut Vec<Frame<T>>,
                     visited_index: &mut HashMap<T, usize>,
                     min_index: &mut HashMap<T, usize>,
                     stack: &mut Vec<T>,
                     on_stack: &mut HashSet<T>| {
        let index = visited_index.len();
        visited_index.insert(v, index);
        min_index.insert(v, index);
        stack.push(v);
        on_stack.insert(v);
        frames.push(Frame {
            node: v,
            neighbors: graph.get(&v).map_or_else(Vec::new, |n| n.iter().copied().collect()),
            next: 0,
        });
    };

    for &root in graph.keys() {
        if visited_index.contains_key(&root) {
            continue;
        }

        let mut frames: Vec<Frame<T>> = Vec::new();
        visit(
            root,
            &mut frames,
            &mut visited_index,
            &mut min_index,
            &mut stack,
            &mut on_stack,
        );

        'walk: while let Some(top) = frames.len().checked_sub(1) {
            while frames[top].next < frames[top].neighbors.len() {
                let w = frames[top].neighbors[frames[top].next];
                frames[top].next += 1;

                if !visited_index.contains_key(&w) {
                    visit(
                        w,
                        &mut frames,
                        &mut visited_index,
                        &mut min_index,
                        &mut stack,
                        &mut on_stack,
                    );
                    continue 'walk;
                }

                if on_stack.contains(&w) {
                    let v = frames[top].node;
                    let reachable = min_index[&v].min(visited_index[&w]);
                    min_index.insert(v, reachable);
                }
                // If w is not on the stack, (v, w) points to an SCC
                // already found
            }

            let Some(frame) = frames.pop() else {
                break;
            };
            let v = frame.node;

            // If v is a root node
            if min_index[&v] == visited_index[&v] {
                let mut scc = HashSet::new();

                while let Some(w) = stack.pop() {
                    on_stack.remove(&w);
                    scc.insert(w);

                    if w == v {
                        break;
                    }
                }

                sccs.push(scc);
            }

            if let Some(parent) = frames.last() {
                let reachable = min_index[&parent.node].min(min_index[&v]);
                min_index.insert(parent.node, reachable);
            }
        }
    }

    sccs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(u32, &[u32])]) -> HashMap<u32, HashSet<u32>> {
        edges
            .iter()
            .map(|(v, ws)| (*v, ws.iter().copied().collect()))
            .collect()
    }

    fn find<'s>(sccs: &'s [HashSet<u32>], member: u32) -> &'s HashSet<u32> {
        sccs.iter()
            .find(|scc| scc.contains(&member))
            .expect("every node belongs to one SCC")
    }

    #[test]
    fn singletons_without_self_loops() {
        let sccs = compute_sccs(&graph(&[(0, &[1]), (1, &[2]), (2, &[])]));

        assert_eq!(sccs.len(), 3);
        assert!(sccs.iter().all(|scc| scc.len() == 1));
    }

    #[test]
    fn self_loop_is_its_own_component() {
        let sccs = compute_sccs(&graph(&[(0, &[0]), (1, &[0])]));

        assert_eq!(sccs.len(), 2);
        assert_eq!(find(&sccs, 0), &HashSet::from([0]));
    }

    #[test]
    fn mutual_cycle_is_grouped() {
        let sccs = compute_sccs(&graph(&[(0, &[1]), (1, &[0]), (2, &[0])]));

        assert_eq!(sccs.len(), 2);
        assert_eq!(find(&sccs, 0), &HashSet::from([0, 1]));
        assert_eq!(find(&sccs, 2), &HashSet::from([2]));
    }

    #[test]
    fn nested_cycles_collapse_into_one_component() {
        let sccs = compute_sccs(&graph(&[
            (0, &[1]),
            (1, &[2, 0]),
            (2, &[0]),
            (3, &[1, 4]),
            (4, &[]),
        ]));

        assert_eq!(find(&sccs, 0), &HashSet::from([0, 1, 2]));
        assert_eq!(find(&sccs, 3).len(), 1);
        assert_eq!(find(&sccs, 4).len(), 1);
    }

    #[test]
    fn neighbors_missing_from_the_map_are_sinks() {
        let sccs = compute_sccs(&graph(&[(0, &[7])]));

        assert_eq!(sccs.len(), 2);
        assert_eq!(find(&sccs, 0), &HashSet::from([0]));
        assert_eq!(find(&sccs, 7), &HashSet::from([7]));
    }
}
