//! Hierarchical grouping and summarization.
//!
//! `group_data` partitions rows by the first group key in one hash pass,
//! summarizes every partition with the columns' aggregators and recurses
//! into the remaining keys. Each partition is identified by its path from
//! the root: top-level partitions by their key text, nested ones by
//! `parent_id/key`.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use horizon_core::schema::{AggregateContext, Aggregator, Schema};
use horizon_core::{Error, Result, Row, Value};

/// One partition of a grouping.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupNode {
    /// Hierarchical id (`east/books`).
    pub id: String,
    /// Column this level is grouped by.
    pub group_key: String,
    /// Shared value of `group_key` within the partition.
    pub key: Value,
    /// Summary row laid out like the input rows.
    pub summary: Row,
    /// Partitions of the next group key.
    pub children: Vec<GroupNode>,
    /// Rows of a deepest-level partition when leaves were requested.
    pub leaves: Vec<Row>,
}

impl GroupNode {
    /// Iterates over this node and its descendants, parents first.
    pub fn depth_first(&self) -> impl Iterator<Item = &GroupNode> {
        let mut stack = alloc::vec![self];
        core::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

/// Result of a grouping.
#[derive(Clone, Debug, PartialEq)]
pub enum Grouping {
    /// Top-level partitions.
    Groups(Vec<GroupNode>),
    /// Input rows, returned when no group key is given and leaves were
    /// requested.
    Leaves(Vec<Row>),
}

impl Grouping {
    /// Returns the top-level partitions, empty for `Leaves`.
    pub fn groups(&self) -> &[GroupNode] {
        match self {
            Grouping::Groups(groups) => groups,
            Grouping::Leaves(_) => &[],
        }
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        match self {
            Grouping::Groups(groups) => groups.len(),
            Grouping::Leaves(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Position of a partition within its grouping, handed to aggregators.
#[derive(Clone, Copy, Debug, Default)]
pub struct SummaryContext<'a> {
    /// Group key of the current level, None at the root.
    pub group_key: Option<&'a str>,
    /// Hierarchical id of the partition.
    pub branch_path: &'a str,
    /// Summary of the enclosing partition.
    pub parent: Option<&'a Row>,
}

/// Partitions `rows` by `group_keys` and summarizes every partition.
///
/// With no group keys the input rows come back as `Leaves` when
/// `include_leaves` is set, and an empty grouping otherwise.
pub fn group_data(
    schema: &Schema,
    rows: &[Row],
    group_keys: &[String],
    include_leaves: bool,
) -> Result<Grouping> {
    let offsets = key_offsets(schema, group_keys)?;
    let refs: Vec<&Row> = rows.iter().filter(|r| !r.is_removed()).collect();
    if offsets.is_empty() {
        return Ok(if include_leaves {
            Grouping::Leaves(refs.into_iter().cloned().collect())
        } else {
            Grouping::Groups(Vec::new())
        });
    }

    let mut pins = Vec::with_capacity(offsets.len());
    Ok(Grouping::Groups(build_level(
        schema,
        &refs,
        group_keys,
        &offsets,
        include_leaves,
        None,
        None,
        &mut pins,
    )))
}

/// Like `group_data`, restricted to the rows whose id is in `selected_ids`.
///
/// Partitions without a selected row are skipped and every summary covers
/// only the selected rows of its partition.
pub fn group_selected_data(
    schema: &Schema,
    rows: &[Row],
    group_keys: &[String],
    include_leaves: bool,
    selected_ids: &[Value],
) -> Result<Grouping> {
    let selected: HashSet<&Value> = selected_ids.iter().collect();
    let id_index = schema.id_index();
    let subset: Vec<Row> = rows
        .iter()
        .filter(|r| r.get(id_index).is_some_and(|id| selected.contains(id)))
        .cloned()
        .collect();
    group_data(schema, &subset, group_keys, include_leaves)
}

fn key_offsets(schema: &Schema, group_keys: &[String]) -> Result<Vec<usize>> {
    group_keys
        .iter()
        .map(|key| {
            schema
                .offset(key)
                .ok_or_else(|| Error::column_not_found("groupBy", key.as_str()))
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn build_level(
    schema: &Schema,
    rows: &[&Row],
    group_keys: &[String],
    offsets: &[usize],
    include_leaves: bool,
    parent_id: Option<&str>,
    parent: Option<&Row>,
    pins: &mut Vec<(usize, Value)>,
) -> Vec<GroupNode> {
    let offset = offsets[0];
    let mut slots: HashMap<&Value, usize> = HashMap::new();
    let mut partitions: Vec<(&Value, Vec<&Row>)> = Vec::new();

    for &row in rows {
        let key = row.get(offset).unwrap_or(&Value::Null);
        match slots.get(key) {
            Some(&slot) => partitions[slot].1.push(row),
            None => {
                slots.insert(key, partitions.len());
                partitions.push((key, alloc::vec![row]));
            }
        }
    }

    let last_level = offsets.len() == 1;
    partitions
        .into_iter()
        .map(|(key, members)| {
            let id = match parent_id {
                Some(parent_id) => format!("{}/{}", parent_id, key),
                None => key.to_string(),
            };
            let owned: Vec<Row> = members.iter().map(|r| (*r).clone()).collect();
            pins.push((offset, key.clone()));

            let mut summary = summarize(
                &owned,
                schema,
                SummaryContext {
                    group_key: Some(&group_keys[0]),
                    branch_path: &id,
                    parent,
                },
            );
            for (pinned, value) in pins.iter() {
                summary.set(*pinned, value.clone());
            }

            let children = if last_level {
                Vec::new()
            } else {
                build_level(
                    schema,
                    &members,
                    &group_keys[1..],
                    &offsets[1..],
                    include_leaves,
                    Some(&id),
                    Some(&summary),
                    pins,
                )
            };
            pins.pop();

            GroupNode {
                id,
                group_key: group_keys[0].clone(),
                key: key.clone(),
                summary,
                children,
                leaves: if last_level && include_leaves { owned } else { Vec::new() },
            }
        })
        .collect()
}

/// Produces one summary row for `rows`, laid out by `schema`.
pub fn summarize(rows: &[Row], schema: &Schema, ctx: SummaryContext<'_>) -> Row {
    let mut summary = Row::empty(schema.len());
    for (offset, column) in schema.columns().iter().enumerate() {
        let cells = || rows.iter().map(move |r| r.get(offset).unwrap_or(&Value::Null));
        let value = match column.aggregator.as_ref() {
            Some(Aggregator::Sum) => sum(cells()),
            Some(Aggregator::Avg) => avg(cells()),
            Some(Aggregator::Max) => cells().filter(|v| !v.is_null()).max().cloned().unwrap_or_default(),
            Some(Aggregator::Min) => cells().filter(|v| !v.is_null()).min().cloned().unwrap_or_default(),
            Some(Aggregator::Count) => Value::Int64(rows.len() as i64),
            Some(Aggregator::First) => cells().next().cloned().unwrap_or_default(),
            Some(Aggregator::Last) => cells().last().cloned().unwrap_or_default(),
            Some(Aggregator::None) | None => uniform(cells()),
            Some(Aggregator::Custom(f)) => (**f)(&AggregateContext {
                rows,
                schema,
                column: &column.name,
                group_key: ctx.group_key,
                branch_path: ctx.branch_path,
                parent: ctx.parent,
            }),
        };
        summary.set(offset, value);
    }
    summary
}

fn sum<'a>(cells: impl Iterator<Item = &'a Value>) -> Value {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0;
    let mut seen = false;
    for cell in cells {
        match cell {
            Value::Int64(n) => {
                int_total = int_total.and_then(|t| t.checked_add(*n));
                float_total += *n as f64;
                seen = true;
            }
            Value::Float64(f) => {
                int_total = None;
                float_total += f;
                seen = true;
            }
            _ => {}
        }
    }
    match (seen, int_total) {
        (false, _) => Value::Null,
        (true, Some(total)) => Value::Int64(total),
        (true, None) => Value::Float64(float_total),
    }
}

fn avg<'a>(cells: impl Iterator<Item = &'a Value>) -> Value {
    let (total, count) = cells
        .filter_map(|v| match v {
            Value::Int64(_) | Value::Float64(_) => v.as_f64(),
            _ => None,
        })
        .fold((0.0, 0usize), |(t, c), x| (t + x, c + 1));
    if count == 0 {
        Value::Null
    } else {
        Value::Float64(total / count as f64)
    }
}

fn uniform<'a>(mut cells: impl Iterator<Item = &'a Value>) -> Value {
    let Some(first) = cells.next() else {
        return Value::Null;
    };
    if cells.all(|v| v == first) {
        first.clone()
    } else {
        Value::Null
    }
}
