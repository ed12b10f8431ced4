// src/problem/mod.rs
//! Prediction problems over a PUMS table: which columns are features, how the
//! target and group columns are mapped, and which rows take part.

pub mod transform;

pub use transform::{CmpOp, Condition, Postprocess, RowFilter, Transform};

use anyhow::{bail, Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::table::{filter_rows, numeric_column};

#[derive(Debug, Clone, PartialEq)]
pub struct BasicProblem {
    name: String,
    features: Vec<String>,
    target: String,
    target_transform: Option<Transform>,
    group: Option<String>,
    group_transform: Transform,
    preprocess: Vec<RowFilter>,
    postprocess: Postprocess,
}

/// Output of [`BasicProblem::df_to_arrays`]. `features` is row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemArrays {
    pub feature_names: Vec<String>,
    pub features: Vec<f64>,
    pub labels: Vec<f64>,
    pub groups: Vec<f64>,
}

impl ProblemArrays {
    pub fn num_rows(&self) -> usize {
        self.labels.len()
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.num_features();
        &self.features[i * n..(i + 1) * n]
    }

    /// One Float64 column per feature, then `label` and `group`.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let n = self.num_features();
        let mut fields = Vec::with_capacity(n + 2);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(n + 2);
        for (j, name) in self.feature_names.iter().enumerate() {
            let values: Vec<f64> = (0..self.num_rows()).map(|i| self.features[i * n + j]).collect();
            fields.push(Field::new(name, DataType::Float64, false));
            columns.push(Arc::new(Float64Array::from(values)));
        }
        for (name, values) in [("label", &self.labels), ("group", &self.groups)] {
            fields.push(Field::new(name, DataType::Float64, false));
            columns.push(Arc::new(Float64Array::from(values.clone())));
        }
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
            .context("building problem table")
    }
}

impl BasicProblem {
    pub fn new<S: AsRef<str>>(name: &str, features: &[S], target: &str) -> Self {
        BasicProblem {
            name: name.to_string(),
            features: features.iter().map(|f| f.as_ref().to_string()).collect(),
            target: target.to_string(),
            target_transform: None,
            group: None,
            group_transform: Transform::Identity,
            preprocess: Vec::new(),
            postprocess: Postprocess::Identity,
        }
    }

    pub fn target_transform(mut self, t: Transform) -> Self {
        self.target_transform = Some(t);
        self
    }

    pub fn group(mut self, column: &str) -> Self {
        self.group = Some(column.to_string());
        self
    }

    pub fn group_transform(mut self, t: Transform) -> Self {
        self.group_transform = t;
        self
    }

    /// Filters run in order; a row must survive all of them.
    pub fn preprocess(mut self, filter: RowFilter) -> Self {
        self.preprocess.push(filter);
        self
    }

    pub fn postprocess(mut self, p: Postprocess) -> Self {
        self.postprocess = p;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn group_column(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Every column this problem reads.
    pub fn columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = self.features.iter().map(String::as_str).collect();
        cols.push(&self.target);
        if let Some(g) = &self.group {
            cols.push(g);
        }
        cols
    }

    fn row_mask(&self, batch: &RecordBatch) -> Result<Vec<bool>> {
        let mut mask = vec![true; batch.num_rows()];
        for filter in &self.preprocess {
            for (m, keep) in mask.iter_mut().zip(filter.mask(batch)?) {
                *m &= keep;
            }
        }
        Ok(mask)
    }

    /// Filter the rows, then build the feature matrix, labels and groups.
    #[instrument(level = "debug", skip(self, batch), fields(task = %self.name, rows = batch.num_rows()))]
    pub fn df_to_arrays(&self, batch: &RecordBatch) -> Result<ProblemArrays> {
        if self.features.is_empty() {
            bail!("{} has no features", self.name);
        }
        let data = if self.preprocess.is_empty() {
            batch.clone()
        } else {
            filter_rows(batch, &self.row_mask(batch)?)?
        };
        let rows = data.num_rows();

        let columns = self
            .features
            .iter()
            .map(|f| numeric_column(&data, f).with_context(|| format!("feature {}", f)))
            .collect::<Result<Vec<_>>>()?;
        let mut features = Vec::with_capacity(rows * columns.len());
        for i in 0..rows {
            features.extend(columns.iter().map(|c| c[i]));
        }
        self.postprocess.apply(&mut features, columns.len());

        let target = numeric_column(&data, &self.target)
            .with_context(|| format!("target {}", self.target))?;
        let labels = match &self.target_transform {
            Some(t) => target.into_iter().map(|v| t.apply(v)).collect(),
            None => target,
        };

        let groups = match &self.group {
            Some(g) => numeric_column(&data, g)
                .with_context(|| format!("group {}", g))?
                .into_iter()
                .map(|v| self.group_transform.apply(v))
                .collect(),
            None => vec![0.0; rows],
        };

        debug!(kept = rows, dropped = batch.num_rows() - rows, "built arrays");
        Ok(ProblemArrays {
            feature_names: self.features.clone(),
            features,
            labels,
            groups,
        })
    }
}
