//! FILENAME: core/pivot-engine/src/tree.rs
//! Row hierarchy - the dimension tree and its bottom-up rollup.
//!
//! `PivotNode` is built from the distinct composite keys of an
//! `AggregationMatrix`. A node is either a leaf holding the cells of exactly
//! one composite key, or a branch holding children keyed by the next
//! dimension. Every key has one component per active dimension, so leaves
//! only occur at the deepest level and a node is never both.
//!
//! `RolledNode` mirrors the tree with additive accumulators on every node.
//! A branch's accumulators are a pure function of its children's.

use crate::cache::{section_key, AggregationMatrix, CellAccumulator, CompositeKey};
use crate::definition::CalculationMode;

// ============================================================================
// HIERARCHY
// ============================================================================

/// A node in the row hierarchy. Borrows its cells from the matrix.
#[derive(Debug, Clone)]
pub enum PivotNode<'m> {
    Leaf {
        /// Dimension value at this level.
        value: &'m str,
        /// The complete composite key this leaf represents.
        key: &'m CompositeKey,
        /// One accumulator per output column.
        cells: &'m [CellAccumulator],
    },
    Branch {
        value: &'m str,
        /// Path from the root down to and including this node.
        path: &'m [String],
        /// Children ordered by their dimension value.
        children: Vec<PivotNode<'m>>,
    },
}

impl<'m> PivotNode<'m> {
    pub fn value(&self) -> &'m str {
        match self {
            PivotNode::Leaf { value, .. } | PivotNode::Branch { value, .. } => *value,
        }
    }

    pub fn path(&self) -> &'m [String] {
        match self {
            PivotNode::Leaf { key, .. } => (*key).as_slice(),
            PivotNode::Branch { path, .. } => *path,
        }
    }

    /// Zero-based level of this node.
    pub fn depth(&self) -> usize {
        self.path().len() - 1
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, PivotNode::Leaf { .. })
    }

    /// Number of leaves under (or at) this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            PivotNode::Leaf { .. } => 1,
            PivotNode::Branch { children, .. } => children.iter().map(PivotNode::leaf_count).sum(),
        }
    }
}

/// Builds the top level of the row hierarchy from the matrix keys.
///
/// The matrix keeps its keys in lexicographic component order, so the keys
/// sharing a prefix are contiguous and children come out sorted.
pub fn build_hierarchy(matrix: &AggregationMatrix) -> Vec<PivotNode<'_>> {
    let entries: Vec<(&CompositeKey, &[CellAccumulator])> = matrix
        .rows
        .iter()
        .map(|(key, cells)| (key, cells.as_slice()))
        .collect();
    build_level(&entries, 0)
}

fn build_level<'m>(
    entries: &[(&'m CompositeKey, &'m [CellAccumulator])],
    level: usize,
) -> Vec<PivotNode<'m>> {
    let mut nodes = Vec::new();
    let mut start = 0;

    while start < entries.len() {
        let (first_key, first_cells) = entries[start];
        let value = first_key[level].as_str();

        let mut end = start + 1;
        while end < entries.len() && entries[end].0[level] == first_key[level] {
            end += 1;
        }

        if level + 1 == first_key.len() {
            // Distinct keys of equal length: a full-depth group is one entry.
            nodes.push(PivotNode::Leaf {
                value,
                key: first_key,
                cells: first_cells,
            });
        } else {
            nodes.push(PivotNode::Branch {
                value,
                path: &first_key[..=level],
                children: build_level(&entries[start..end], level + 1),
            });
        }

        start = end;
    }

    nodes
}

// ============================================================================
// ROLLUP
// ============================================================================

/// A hierarchy node with its rolled-up accumulators.
#[derive(Debug, Clone)]
pub struct RolledNode<'m> {
    pub value: &'m str,
    pub path: &'m [String],
    /// One accumulator per output column: the leaf's own cells, or the
    /// merge of the children's.
    pub cells: Vec<CellAccumulator>,
    /// Merge of `cells` across all columns.
    pub row_total: CellAccumulator,
    /// Empty for leaves.
    pub children: Vec<RolledNode<'m>>,
    pub is_leaf: bool,
}

impl<'m> RolledNode<'m> {
    pub fn section_key(&self) -> String {
        section_key(self.path)
    }

    /// Cell values and row total in the units of `mode`.
    pub fn values(&self, mode: CalculationMode, grand_sum: f64) -> (Vec<f64>, f64) {
        project(&self.cells, &self.row_total, mode, grand_sum)
    }
}

/// Rolls a node up. Leaves copy their cells; branches merge their children
/// column by column, so averages stay (sum of sums) / (sum of counts).
pub fn roll_up<'m>(node: &PivotNode<'m>, column_count: usize) -> RolledNode<'m> {
    match node {
        PivotNode::Leaf { value, key, cells } => {
            let cells = cells.to_vec();
            let row_total = CellAccumulator::merged(&cells);
            RolledNode {
                value: *value,
                path: (*key).as_slice(),
                cells,
                row_total,
                children: Vec::new(),
                is_leaf: true,
            }
        }
        PivotNode::Branch { value, path, children } => {
            let children: Vec<RolledNode<'m>> =
                children.iter().map(|c| roll_up(c, column_count)).collect();

            let mut cells = vec![CellAccumulator::new(); column_count];
            for child in &children {
                for (total, cell) in cells.iter_mut().zip(&child.cells) {
                    total.merge(cell);
                }
            }
            let row_total = CellAccumulator::merged(&cells);

            RolledNode {
                value: *value,
                path: *path,
                cells,
                row_total,
                children,
                is_leaf: false,
            }
        }
    }
}

/// Projects accumulators into display units.
pub fn project(
    cells: &[CellAccumulator],
    row_total: &CellAccumulator,
    mode: CalculationMode,
    grand_sum: f64,
) -> (Vec<f64>, f64) {
    let values = cells.iter().map(|c| c.compute(mode, grand_sum)).collect();
    (values, row_total.compute(mode, grand_sum))
}
