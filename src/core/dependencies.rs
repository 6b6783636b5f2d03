//! Series dependency graph and evaluation order.

use super::generalizer::specialize;
use crate::extraction::SeriesIndex;
use crate::formula::Expr;
use crate::types::{Series, SeriesId};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

/// Every series named by a reference inside the formula
pub fn referenced_series(expr: &Expr) -> BTreeSet<SeriesId> {
    let mut found = BTreeSet::new();
    expr.visit(&mut |node| match node {
        Expr::Generic(range) => found.extend(range.series.iter().cloned()),
        Expr::Series(range) => found.extend(range.series.iter().cloned()),
        _ => {}
    });
    found
}

/// Edge A → B when A's generic formula reads B
/// Every series the generic formula of `series` reads at any of its rows.
///
/// References whose header position moves from row to row reach other
/// series than the ones named at n = 1, so those are specialized row by row.
pub fn series_read_by(
    series: &Series,
    generic: &Expr,
    index: &SeriesIndex,
) -> BTreeSet<SeriesId> {
    let mut found = referenced_series(generic);
    if shifts_position(generic) {
        for n in 2..=series.length {
            found.extend(referenced_series(&specialize(generic, n, index)));
        }
    }
    found
}

fn shifts_position(expr: &Expr) -> bool {
    let mut shifts = false;
    expr.visit(&mut |node| {
        if let Expr::Generic(range) = node {
            shifts |= range.position_deltas.iter().any(|d| *d != (0, 0));
        }
    });
    shifts
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<SeriesId, ()>,
    nodes: HashMap<SeriesId, NodeIndex>,
}

impl DependencyGraph {
    pub fn build<'a>(all: impl IntoIterator<Item = &'a Series>, index: &SeriesIndex) -> Self {
        let mut deps = DependencyGraph::default();
        let all: Vec<&Series> = all.into_iter().collect();

        for series in &all {
            deps.node(&series.id);
        }

        for series in &all {
            let Some(generic) = &series.generic_formula else {
                continue;
            };
            let from = deps.node(&series.id);
            for target in series_read_by(series, generic, index) {
                let to = deps.node(&target);
                deps.graph.update_edge(from, to, ());
            }
        }

        deps
    }

    fn node(&mut self, id: &SeriesId) -> NodeIndex {
        if let Some(idx) = self.nodes.get(id) {
            return *idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.nodes.insert(id.clone(), idx);
        idx
    }

    /// Series the given one reads, sorted
    pub fn dependencies(&self, id: &SeriesId) -> Vec<&SeriesId> {
        let Some(idx) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut deps: Vec<&SeriesId> = self
            .graph
            .neighbors_directed(*idx, Direction::Outgoing)
            .filter_map(|n| self.graph.node_weight(n))
            .collect();
        deps.sort();
        deps
    }

    /// Depth-first post-order over all nodes: every series comes after the
    /// series it reads. Cycles are not reported here; a series caught in one
    /// is emitted before one of its own dependencies.
    pub fn sorted(&self) -> Vec<SeriesId> {
        let mut order = Vec::with_capacity(self.graph.node_count());
        let mut dfs = DfsPostOrder::empty(&self.graph);

        for start in self.graph.node_indices() {
            dfs.move_to(start);
            while let Some(idx) = dfs.next(&self.graph) {
                if let Some(id) = self.graph.node_weight(idx) {
                    order.push(id.clone());
                }
            }
        }

        order
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellAddress, GenericRange, HeaderLocation, RowSpan, SeriesDataType};

    fn id(header: &str, column: u32) -> SeriesId {
        SeriesId::new("S", header, 1, column)
    }

    fn reading(target: &SeriesId) -> Expr {
        Expr::Generic(GenericRange {
            series: vec![target.clone()],
            span: RowSpan::Offsets { start: 0, end: 0 },
            row_delta: Some((1, 1)),
            position_deltas: vec![(0, 0)],
        })
    }

    fn series(id: SeriesId, formula: Option<Expr>) -> Series {
        Series {
            starting_cell: CellAddress::new(id.header_column, 2),
            id,
            header_location: HeaderLocation::Top,
            length: 3,
            formulas: [None, None],
            sample_values: vec![],
            data_type: SeriesDataType::Float,
            generic_formula: formula,
        }
    }

    fn position(order: &[SeriesId], id: &SeriesId) -> usize {
        order.iter().position(|x| x == id).unwrap()
    }

    #[test]
    fn test_chain_sorts_dependencies_first() {
        let (a, b, c) = (id("a", 1), id("b", 2), id("c", 3));
        // Listed in reverse so the order cannot come from input order
        let all = vec![
            series(c.clone(), Some(reading(&b))),
            series(b.clone(), Some(reading(&a))),
            series(a.clone(), None),
        ];
        let graph = DependencyGraph::build(&all, &SeriesIndex::build(&all));
        let order = graph.sorted();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn test_every_dependency_precedes_dependent() {
        let ids: Vec<SeriesId> = (1..=6).map(|i| id(&format!("s{}", i), i)).collect();
        let sum_of = |deps: &[&SeriesId]| Expr::FunctionCall {
            name: "SUM".to_string(),
            args: deps.iter().map(|d| reading(d)).collect(),
        };
        let all = vec![
            series(ids[0].clone(), Some(sum_of(&[&ids[3], &ids[4]]))),
            series(ids[1].clone(), Some(sum_of(&[&ids[0]]))),
            series(ids[2].clone(), None),
            series(ids[3].clone(), Some(sum_of(&[&ids[2]]))),
            series(ids[4].clone(), Some(sum_of(&[&ids[2], &ids[3]]))),
            series(ids[5].clone(), Some(sum_of(&[&ids[1], &ids[4]]))),
        ];
        let graph = DependencyGraph::build(&all, &SeriesIndex::build(&all));
        let order = graph.sorted();
        assert_eq!(order.len(), 6);

        for s in &all {
            for dep in graph.dependencies(&s.id) {
                assert!(
                    position(&order, dep) < position(&order, &s.id),
                    "{} must precede {}",
                    dep,
                    s.id
                );
            }
        }
    }

    #[test]
    fn test_unknown_targets_become_nodes() {
        let outside = SeriesId::new("Other", "x", 1, 1);
        let all = vec![series(id("a", 1), Some(reading(&outside)))];
        let graph = DependencyGraph::build(&all, &SeriesIndex::build(&all));
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.sorted().first(), Some(&outside));
    }

    #[test]
    fn test_shifted_targets_become_edges() {
        // t reads r1 at its first row and r2, r3 further down
        let row_series = |header: &str, row: u32, formula: Option<Expr>| Series {
            id: SeriesId::new("S", header, row, 4),
            header_location: HeaderLocation::Left,
            starting_cell: CellAddress::new(5, row),
            length: 2,
            formulas: [None, None],
            sample_values: vec![],
            data_type: SeriesDataType::Float,
            generic_formula: formula,
        };
        let r1 = row_series("r1", 1, None);
        let r2 = row_series("r2", 2, None);
        let r3 = row_series("r3", 3, Some(reading(&r1.id)));
        let t = Series {
            length: 3,
            generic_formula: Some(Expr::Generic(GenericRange {
                series: vec![r1.id.clone()],
                span: RowSpan::Offsets { start: 0, end: 1 },
                row_delta: None,
                position_deltas: vec![(1, 0)],
            })),
            ..series(id("t", 1), None)
        };

        let all = vec![t.clone(), r1.clone(), r2.clone(), r3.clone()];
        let graph = DependencyGraph::build(&all, &SeriesIndex::build(&all));
        assert_eq!(graph.dependencies(&t.id), vec![&r1.id, &r2.id, &r3.id]);

        let order = graph.sorted();
        assert!(position(&order, &r3.id) < position(&order, &t.id));
    }

    #[test]
    fn test_referenced_series_are_unique() {
        let a = id("a", 1);
        let expr = Expr::BinaryOp {
            op: "+".to_string(),
            left: Box::new(reading(&a)),
            right: Box::new(reading(&a)),
        };
        assert_eq!(referenced_series(&expr).len(), 1);
    }

    #[test]
    fn test_cycle_still_emits_every_node_once() {
        let (a, b) = (id("a", 1), id("b", 2));
        let all = vec![
            series(a.clone(), Some(reading(&b))),
            series(b.clone(), Some(reading(&a))),
        ];
        let order = DependencyGraph::build(&all, &SeriesIndex::build(&all)).sorted();
        assert_eq!(order.len(), 2);
    }
}
