// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Join operators and the base they share.
//!
//! The base owns everything that is not specific to the join algorithm:
//! rendering a (left, right) pair through the ON condition and the
//! post-processing spec, and the output receiver the rendered rows go to.
//! Expression evaluation itself is an external collaborator, passed in as
//! closures compiled by the planner.

pub mod hash_join;

use std::sync::Arc;

use rowflow_common::{null_row, JoinType, Result, Row, RowFlowError};

use crate::stream::RowReceiver;

/// ON-condition evaluator over a (left, right) row pair. The join only asks
/// whether the pair passes.
pub type OnExpr = Arc<dyn Fn(&Row, &Row) -> Result<bool> + Send + Sync>;

/// Filter over a combined output row, applied before projection.
pub type RowFilter = Arc<dyn Fn(&Row) -> Result<bool> + Send + Sync>;

/// Post-processing applied to every rendered row before emission.
#[derive(Clone, Default)]
pub struct PostProcessSpec {
    /// Filter over the combined (left ++ right) row.
    pub filter: Option<RowFilter>,
    /// Indices into the combined row to project. `None` emits the combined
    /// row unchanged.
    pub output_columns: Option<Vec<usize>>,
}

/// Configuration of a hash join.
#[derive(Clone)]
pub struct HashJoinerSpec {
    pub join_type: JoinType,
    /// Equality columns of the left input; paired positionally with
    /// `right_eq_columns`, which must have the same length.
    pub left_eq_columns: Vec<usize>,
    pub right_eq_columns: Vec<usize>,
    pub on_expr: Option<OnExpr>,
}

/// State shared by join operators.
pub(crate) struct JoinerBase {
    pub(crate) join_type: JoinType,
    empty_left: Row,
    empty_right: Row,
    on_expr: Option<OnExpr>,
    post: PostProcessSpec,
    pub(crate) output: Box<dyn RowReceiver>,
}

impl JoinerBase {
    pub(crate) fn new(
        join_type: JoinType,
        left_width: usize,
        right_width: usize,
        on_expr: Option<OnExpr>,
        post: PostProcessSpec,
        output: Box<dyn RowReceiver>,
    ) -> Self {
        Self {
            join_type,
            empty_left: null_row(left_width),
            empty_right: null_row(right_width),
            on_expr,
            post,
            output,
        }
    }

    /// Renders a (left, right) pair into an output row.
    ///
    /// A `None` side stands for the all-NULL padding of an outer emission.
    /// The ON condition applies only to real pairs: an unmatched row is
    /// emitted regardless of the ON predicate, which only decides whether a
    /// pair matches. Returns `(None, true)` when the ON condition rejected
    /// the pair, `(None, false)` when post-processing produced nothing
    /// visible, and `(Some(row), false)` otherwise.
    pub(crate) fn render(
        &self,
        left: Option<&Row>,
        right: Option<&Row>,
    ) -> Result<(Option<Row>, bool)> {
        let lrow = left.unwrap_or(&self.empty_left);
        let rrow = right.unwrap_or(&self.empty_right);
        if left.is_some() && right.is_some() {
            if let Some(on_expr) = &self.on_expr {
                if !on_expr(lrow, rrow)? {
                    return Ok((None, true));
                }
            }
        }

        let mut combined = Vec::with_capacity(lrow.len() + rrow.len());
        combined.extend_from_slice(lrow);
        combined.extend_from_slice(rrow);

        if let Some(filter) = &self.post.filter {
            if !filter(&combined)? {
                return Ok((None, false));
            }
        }
        let row = match &self.post.output_columns {
            Some(cols) => {
                let mut projected = Vec::with_capacity(cols.len());
                for &col in cols {
                    let datum = combined.get(col).cloned().ok_or_else(|| {
                        RowFlowError::Internal(format!(
                            "output column {col} out of range for combined row with {} columns",
                            combined.len()
                        ))
                    })?;
                    projected.push(datum);
                }
                projected
            }
            None => combined,
        };
        Ok((Some(row), false))
    }
}
