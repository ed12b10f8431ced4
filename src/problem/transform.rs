// src/problem/transform.rs
use anyhow::Result;
use arrow::record_batch::RecordBatch;

use crate::table::numeric_column;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CmpOp {
    /// IEEE comparison: anything against NaN is false, except `Ne`.
    pub fn apply(self, a: f64, b: f64) -> bool {
        match self {
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
        }
    }
}

/// Row predicate over numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Cmp { column: String, op: CmpOp, value: f64 },
    Any(Vec<Condition>),
    All(Vec<Condition>),
}

impl Condition {
    pub fn cmp(column: &str, op: CmpOp, value: f64) -> Self {
        Condition::Cmp {
            column: column.to_string(),
            op,
            value,
        }
    }

    pub fn evaluate(&self, batch: &RecordBatch) -> Result<Vec<bool>> {
        match self {
            Condition::Cmp { column, op, value } => Ok(numeric_column(batch, column)?
                .into_iter()
                .map(|v| op.apply(v, *value))
                .collect()),
            Condition::Any(parts) => combine(batch, parts, false, |a, b| a || b),
            Condition::All(parts) => combine(batch, parts, true, |a, b| a && b),
        }
    }
}

fn combine(
    batch: &RecordBatch,
    parts: &[Condition],
    init: bool,
    op: impl Fn(bool, bool) -> bool,
) -> Result<Vec<bool>> {
    let mut acc = vec![init; batch.num_rows()];
    for part in parts {
        for (a, b) in acc.iter_mut().zip(part.evaluate(batch)?) {
            *a = op(*a, b);
        }
    }
    Ok(acc)
}

/// Preprocessing step: keep or drop the rows matching a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    Keep(Condition),
    Drop(Condition),
}

impl RowFilter {
    /// `true` for rows that survive this filter.
    pub fn mask(&self, batch: &RecordBatch) -> Result<Vec<bool>> {
        match self {
            RowFilter::Keep(c) => c.evaluate(batch),
            RowFilter::Drop(c) => Ok(c.evaluate(batch)?.into_iter().map(|m| !m).collect()),
        }
    }
}

/// Element-wise map applied to the target or group column.
/// Predicates produce 1.0 / 0.0.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Identity,
    GreaterThan(f64),
    LessThan(f64),
    Equals(f64),
    OneOf(Vec<f64>),
}

impl Transform {
    pub fn apply(&self, x: f64) -> f64 {
        let hit = match self {
            Transform::Identity => return x,
            Transform::GreaterThan(t) => x > *t,
            Transform::LessThan(t) => x < *t,
            Transform::Equals(t) => x == *t,
            Transform::OneOf(ts) => ts.iter().any(|t| x == *t),
        };
        if hit {
            1.0
        } else {
            0.0
        }
    }
}

/// Final pass over the row-major feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum Postprocess {
    Identity,
    /// Replace NaN with the given value.
    NanToNum(f64),
    /// Per column zero mean / unit variance; NaN is ignored in the statistics and kept.
    Standardize,
}

impl Postprocess {
    pub fn apply(&self, values: &mut [f64], n_cols: usize) {
        match self {
            Postprocess::Identity => {}
            Postprocess::NanToNum(fill) => {
                for v in values.iter_mut().filter(|v| v.is_nan()) {
                    *v = *fill;
                }
            }
            Postprocess::Standardize => standardize(values, n_cols),
        }
    }
}

fn standardize(values: &mut [f64], n_cols: usize) {
    if n_cols == 0 {
        return;
    }
    for col in 0..n_cols {
        let (mut sum, mut count) = (0.0, 0usize);
        for v in values.iter().skip(col).step_by(n_cols).filter(|v| !v.is_nan()) {
            sum += v;
            count += 1;
        }
        if count == 0 {
            continue;
        }
        let mean = sum / count as f64;
        let var = values
            .iter()
            .skip(col)
            .step_by(n_cols)
            .filter(|v| !v.is_nan())
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / count as f64;
        let scale = if var > 0.0 { var.sqrt() } else { 1.0 };
        for v in values.iter_mut().skip(col).step_by(n_cols) {
            *v = (*v - mean) / scale;
        }
    }
}
