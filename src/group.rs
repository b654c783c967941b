//! Hierarchical grouping of a summary table.
//!
//! An [`ImageGroup`] splits the rows of a [`SummaryTable`] by the values of
//! one keyword after another (the tree keys) and records, at each leaf, the
//! values of an index column that identifies the rows, usually `file`.
//!
//! ```text
//! tree keys [imagetyp, filter], index file
//!
//! LIGHT
//!   R
//!     m101-001.fit, m101-002.fit
//!   V
//!     m101-003.fit
//! BIAS
//!   --
//!     bias-001.fit, bias-002.fit
//! ```
//!
//! A masked cell is a group of its own, shown as `--`.

use std::collections::HashSet;
use std::fmt;

use crate::data::loader::MASKED_FIELD;
use crate::data::model::{Cell, Column, HeaderValue, SummaryTable, FILE_COLUMN};
use crate::error::GroupError;

// ---------------------------------------------------------------------------
// GroupTree
// ---------------------------------------------------------------------------

/// One level of the grouping. Branches keep their values in order of first
/// appearance in the table.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupTree {
    /// Index values of the rows in this group, in table order.
    Leaf(Vec<HeaderValue>),
    Branch(Vec<(Cell, GroupTree)>),
}

impl GroupTree {
    /// Follow `path` (one value per tree key level). Values match the way
    /// filters do: strings ignore case, numbers compare by value.
    pub fn get(&self, path: &[HeaderValue]) -> Option<&GroupTree> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };
        match self {
            GroupTree::Leaf(_) => None,
            GroupTree::Branch(children) => children
                .iter()
                .find(|(cell, _)| cell.value().is_some_and(|v| v.matches(first)))
                .and_then(|(_, child)| child.get(rest)),
        }
    }

    /// Index values under this node, in tree order.
    pub fn members(&self) -> Vec<&HeaderValue> {
        match self {
            GroupTree::Leaf(values) => values.iter().collect(),
            GroupTree::Branch(children) => children.iter().flat_map(|(_, c)| c.members()).collect(),
        }
    }

    /// Every leaf with the cells leading to it.
    pub fn leaves(&self) -> Vec<(Vec<&Cell>, &[HeaderValue])> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(
        &'a self,
        path: &mut Vec<&'a Cell>,
        out: &mut Vec<(Vec<&'a Cell>, &'a [HeaderValue])>,
    ) {
        match self {
            GroupTree::Leaf(values) => out.push((path.clone(), values.as_slice())),
            GroupTree::Branch(children) => {
                for (cell, child) in children {
                    path.push(cell);
                    child.collect_leaves(path, out);
                    path.pop();
                }
            }
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            GroupTree::Leaf(values) => {
                let names: Vec<String> = values.iter().map(ToString::to_string).collect();
                writeln!(f, "{:indent$}{}", "", names.join(", "), indent = depth * 2)
            }
            GroupTree::Branch(children) => {
                for (cell, child) in children {
                    writeln!(f, "{:indent$}{}", "", cell_label(cell), indent = depth * 2)?;
                    child.write_indented(f, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for GroupTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

fn cell_label(cell: &Cell) -> String {
    match cell {
        Cell::Value(v) => v.to_string(),
        Cell::Masked => MASKED_FIELD.to_string(),
    }
}

// ---------------------------------------------------------------------------
// ImageGroup
// ---------------------------------------------------------------------------

/// A summary table grouped by `tree_keys`, with leaves identified by the
/// values of `index_key`.
#[derive(Debug, Clone)]
pub struct ImageGroup<'t> {
    table: &'t SummaryTable,
    tree_keys: Vec<String>,
    index_key: String,
    tree: GroupTree,
}

impl<'t> ImageGroup<'t> {
    /// Every tree key and the index key must be columns of `table`. The index
    /// column must identify rows: no masked cells and no repeated values.
    pub fn new<S: AsRef<str>>(
        table: &'t SummaryTable,
        tree_keys: &[S],
        index_key: &str,
    ) -> Result<Self, GroupError> {
        let columns: Vec<&Column> = tree_keys
            .iter()
            .map(|k| {
                table
                    .column(k.as_ref())
                    .ok_or_else(|| GroupError::UnknownKey(k.as_ref().to_string()))
            })
            .collect::<Result<_, _>>()?;
        let index = table
            .column(index_key)
            .ok_or_else(|| GroupError::UnknownKey(index_key.to_string()))?;
        validate_index(index)?;

        let rows: Vec<usize> = (0..table.len()).collect();
        Ok(Self {
            table,
            tree_keys: tree_keys.iter().map(|k| k.as_ref().to_string()).collect(),
            index_key: index_key.to_string(),
            tree: grow(&columns, &rows, index),
        })
    }

    /// Group by `tree_keys` with the `file` column as index.
    pub fn by_file<S: AsRef<str>>(table: &'t SummaryTable, tree_keys: &[S]) -> Result<Self, GroupError> {
        Self::new(table, tree_keys, FILE_COLUMN)
    }

    pub fn table(&self) -> &SummaryTable {
        self.table
    }

    pub fn tree_keys(&self) -> &[String] {
        &self.tree_keys
    }

    pub fn index_key(&self) -> &str {
        &self.index_key
    }

    pub fn tree(&self) -> &GroupTree {
        &self.tree
    }
}

fn validate_index(index: &Column) -> Result<(), GroupError> {
    let mut seen = HashSet::new();
    for cell in &index.cells {
        let Some(value) = cell.value() else {
            return Err(GroupError::MaskedIndex(index.name.clone()));
        };
        if !seen.insert(value) {
            return Err(GroupError::IndexNotUnique {
                key: index.name.clone(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

fn grow(columns: &[&Column], rows: &[usize], index: &Column) -> GroupTree {
    let Some((column, rest)) = columns.split_first() else {
        return GroupTree::Leaf(
            rows.iter()
                .filter_map(|&r| index.cells[r].value().cloned())
                .collect(),
        );
    };
    let mut groups: Vec<(&Cell, Vec<usize>)> = Vec::new();
    for &row in rows {
        let cell = &column.cells[row];
        match groups.iter_mut().find(|(c, _)| *c == cell) {
            Some((_, members)) => members.push(row),
            None => groups.push((cell, vec![row])),
        }
    }
    GroupTree::Branch(
        groups
            .into_iter()
            .map(|(cell, members)| (cell.clone(), grow(rest, &members, index)))
            .collect(),
    )
}
