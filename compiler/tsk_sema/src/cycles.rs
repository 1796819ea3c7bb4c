//! Reference cycle detection.
//!
//! Builds a graph over `(section, key)` nodes with one edge per reference
//! in a key's effective declarations, then runs a depth-first search with
//! three-color marking. Reaching an in-progress node closes a cycle.

use rustc_hash::FxHashSet;
use tracing::trace;
use tsk_ir::visitor::{walk_node, Visitor};
use tsk_ir::{Node, Reference, SourcePos, Span};
use tsk_stack::ensure_sufficient_stack;

use crate::error::{SemanticError, SemanticErrorKind};
use crate::symbols::{Lookup, SymbolTable};

#[derive(Clone, Copy, Debug)]
struct Edge {
    target: usize,
    span: Span,
    pos: SourcePos,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

/// Collects the references inside one value.
struct References<'ast> {
    found: Vec<(&'ast Reference, Span, SourcePos)>,
}

impl<'ast> Visitor<'ast> for References<'ast> {
    fn visit_reference(&mut self, node: &'ast Node, reference: &'ast Reference) {
        self.found.push((reference, node.span, node.pos));
    }
}

fn build_graph(table: &SymbolTable<'_>) -> Vec<Vec<Edge>> {
    table
        .nodes()
        .iter()
        .map(|node| {
            let mut refs = References { found: Vec::new() };
            for decl in &node.decls {
                walk_node(&mut refs, &decl.value);
            }
            refs.found
                .into_iter()
                .filter_map(|(reference, span, pos)| match table.lookup(node.section, reference) {
                    Lookup::Key { node: target, .. } => Some(Edge { target, span, pos }),
                    Lookup::Word(_) | Lookup::Unknown => None,
                })
                .collect()
        })
        .collect()
}

struct Search<'a> {
    edges: &'a [Vec<Edge>],
    colors: Vec<Color>,
    stack: Vec<usize>,
    seen: FxHashSet<Vec<usize>>,
    cycles: Vec<(Vec<usize>, Edge)>,
}

impl Search<'_> {
    fn visit(&mut self, node: usize) {
        self.colors[node] = Color::InProgress;
        self.stack.push(node);
        let edges = self.edges;
        for &edge in &edges[node] {
            match self.colors[edge.target] {
                Color::Unvisited => ensure_sufficient_stack(|| self.visit(edge.target)),
                Color::InProgress => self.close(edge),
                Color::Done => {}
            }
        }
        self.stack.pop();
        self.colors[node] = Color::Done;
    }

    fn close(&mut self, edge: Edge) {
        let Some(start) = self.stack.iter().rposition(|&n| n == edge.target) else {
            return;
        };
        let mut cycle = self.stack[start..].to_vec();
        // Rotate so the same cycle found from another entry point compares equal.
        let min_at = cycle
            .iter()
            .enumerate()
            .min_by_key(|&(_, n)| *n)
            .map_or(0, |(i, _)| i);
        cycle.rotate_left(min_at);
        if self.seen.insert(cycle) {
            let mut path = self.stack[start..].to_vec();
            path.push(edge.target);
            self.cycles.push((path, edge));
        }
    }
}

/// One error per distinct cycle, naming the cycle from the node where the
/// search entered it.
pub(crate) fn find_cycles(table: &SymbolTable<'_>) -> Vec<SemanticError> {
    let edges = build_graph(table);
    let mut search = Search {
        edges: &edges,
        colors: vec![Color::Unvisited; edges.len()],
        stack: Vec::new(),
        seen: FxHashSet::default(),
        cycles: Vec::new(),
    };
    for node in 0..edges.len() {
        if search.colors[node] == Color::Unvisited {
            search.visit(node);
        }
    }

    search
        .cycles
        .into_iter()
        .map(|(path, edge)| {
            let names: Vec<String> = path.iter().map(|&n| table.node(n).display_name()).collect();
            trace!(cycle = %names.join(" -> "), "reference cycle");
            let owner = path[path.len() - 2];
            SemanticError::new(
                SemanticErrorKind::CyclicReference { cycle: names },
                edge.span,
                edge.pos,
                table.node(owner).section,
            )
        })
        .collect()
}
