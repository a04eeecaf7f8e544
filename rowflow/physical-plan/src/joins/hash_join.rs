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

//! The hash join operator.

use std::mem;
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use log::debug;
use rowflow_common::key_encoding::encode_columns_of_row;
use rowflow_common::{config_err, Result, Row};
use rowflow_execution::memory_pool::{MemoryConsumer, MemoryPool, MemoryReservation};

use crate::common::{drain_and_close, emit_helper, RowContainer};
use crate::joins::{HashJoinerSpec, JoinerBase, PostProcessSpec};
use crate::stream::{RowReceiver, RowSource, StreamMessage, StreamMetadata};
use crate::Processor;

/// The set of rows for one group key (the encoded equality columns).
///
/// `rows` holds indices into the joiner's row container. `seen` is used only
/// for outer joins; one entry per entry in `rows`, set once that row had at
/// least one matching row in the opposite stream ("matching" meaning the ON
/// condition passed).
#[derive(Debug, Default)]
struct Bucket {
    rows: Vec<usize>,
    seen: Vec<bool>,
}

const SIZE_OF_BUCKET: usize = mem::size_of::<Bucket>();
const SIZE_OF_ROW_IDX: usize = mem::size_of::<usize>();
const SIZE_OF_SEEN_SLICE: usize = mem::size_of::<Vec<bool>>();
const SIZE_OF_BOOL: usize = mem::size_of::<bool>();

/// Hash join operator: two input streams, one output.
///
/// It works by reading the entire right stream into a hash table, then
/// streaming the left input through it. There is thus no guarantee on the
/// ordering of results that stem only from the right input (unmatched rows of
/// RIGHT OUTER and FULL OUTER joins). Results that involve the left stream
/// preserve its ordering: all results that stem from left row `i` precede
/// results that stem from left row `i + 1`.
pub struct HashJoiner {
    base: JoinerBase,
    left: Box<dyn RowSource>,
    right: Box<dyn RowSource>,
    left_eq_cols: Vec<usize>,
    right_eq_cols: Vec<usize>,

    /// All right rows are stored in this container. The buckets reference
    /// them by index.
    rows: RowContainer,
    buckets: HashMap<Vec<u8>, Bucket>,

    /// The memory account for the buckets. The datums themselves are
    /// attributed to the row container's own reservation.
    buckets_acc: MemoryReservation,
}

impl HashJoiner {
    /// Creates a hash joiner over `left` and `right`, pushing results to
    /// `output`. Memory for the hash table and the buffered right rows is
    /// reserved against `pool`.
    pub fn try_new(
        spec: HashJoinerSpec,
        left: Box<dyn RowSource>,
        right: Box<dyn RowSource>,
        post: PostProcessSpec,
        output: Box<dyn RowReceiver>,
        pool: &Arc<dyn MemoryPool>,
    ) -> Result<Self> {
        if spec.left_eq_columns.len() != spec.right_eq_columns.len() {
            return config_err!(
                "left equality columns ({}) and right equality columns ({}) must have the same length",
                spec.left_eq_columns.len(),
                spec.right_eq_columns.len()
            );
        }
        let base = JoinerBase::new(
            spec.join_type,
            left.types().len(),
            right.types().len(),
            spec.on_expr,
            post,
            output,
        );
        Ok(Self {
            base,
            left,
            right,
            left_eq_cols: spec.left_eq_columns,
            right_eq_cols: spec.right_eq_columns,
            rows: RowContainer::new(MemoryConsumer::new("hash-joiner-rows").register(pool)),
            buckets: HashMap::new(),
            buckets_acc: MemoryConsumer::new("hash-joiner-buckets").register(pool),
        })
    }

    /// Fully consumes the right input, constructing the hash table keyed on
    /// the encoded right equality columns. A row with a NULL in an equality
    /// column will never match anything: RIGHT OUTER and FULL OUTER route it
    /// directly to the output, every other join type discards it, and it is
    /// never inserted into the table. The build phase can therefore already
    /// satisfy the consumer.
    ///
    /// Returns `Ok(true)` if more rows may need to be passed to the output;
    /// the right input has then been fully consumed. Returns `Ok(false)` if
    /// the consumer is satisfied; the inputs and the output have then been
    /// drained and closed. On error, the caller must drain and close.
    async fn build_phase(&mut self) -> Result<bool> {
        let mut scratch = Vec::new();
        loop {
            let Some(msg) = self.right.next().await else {
                return Ok(true);
            };
            let rrow = match msg {
                StreamMessage::Meta(StreamMetadata::Error(err)) => return Err(err),
                meta @ StreamMessage::Meta(_) => {
                    if !emit_helper(
                        self.base.output.as_mut(),
                        meta,
                        &mut [self.left.as_mut(), self.right.as_mut()],
                    )
                    .await
                    {
                        return Ok(false);
                    }
                    continue;
                }
                StreamMessage::Row(row) => row,
            };

            scratch.clear();
            let has_null =
                encode_columns_of_row(&rrow, &self.right_eq_cols, false, &mut scratch)?;
            if has_null {
                // A row with a NULL in an equality column will not match
                // anything. Output it or throw it away.
                if self.base.join_type.emits_unmatched_right() {
                    let (row, _) = self.base.render(None, Some(&rrow))?;
                    if let Some(row) = row {
                        if !emit_helper(
                            self.base.output.as_mut(),
                            StreamMessage::Row(row),
                            &mut [self.left.as_mut(), self.right.as_mut()],
                        )
                        .await
                        {
                            return Ok(false);
                        }
                    }
                }
                continue;
            }

            let row_idx = self.rows.len();
            self.rows.add_row(rrow)?;

            // Account for the row index, and for the key bytes and the bucket
            // overhead when the bucket is new, before the insert.
            let mut usage = SIZE_OF_ROW_IDX;
            if !self.buckets.contains_key(scratch.as_slice()) {
                usage += scratch.len() + SIZE_OF_BUCKET;
            }
            self.buckets_acc.try_grow(usage)?;

            match self.buckets.get_mut(scratch.as_slice()) {
                Some(bucket) => bucket.rows.push(row_idx),
                None => {
                    self.buckets.insert(
                        scratch.clone(),
                        Bucket {
                            rows: vec![row_idx],
                            seen: Vec::new(),
                        },
                    );
                }
            }
        }
    }

    /// Allocates every bucket's `seen` slice, charging the buckets account.
    /// Only called for join types that emit unmatched right rows.
    fn alloc_seen(&mut self) -> Result<()> {
        for bucket in self.buckets.values_mut() {
            self.buckets_acc
                .try_grow(SIZE_OF_SEEN_SLICE + bucket.rows.len() * SIZE_OF_BOOL)?;
            bucket.seen = vec![false; bucket.rows.len()];
        }
        Ok(())
    }

    /// Renders the pair and emits the result if it is visible. The right row,
    /// when present, is given by its container index.
    ///
    /// Returns `(more_rows_needed, failed_on_cond)`. If `more_rows_needed` is
    /// false, the inputs and the output have been drained and closed.
    async fn render_and_emit(
        &mut self,
        left: Option<&Row>,
        right_idx: Option<usize>,
    ) -> Result<(bool, bool)> {
        let (row, failed_on_cond) = {
            let rrow = right_idx.map(|idx| self.rows.row(idx));
            self.base.render(left, rrow)?
        };
        if let Some(row) = row {
            let more_rows_needed = emit_helper(
                self.base.output.as_mut(),
                StreamMessage::Row(row),
                &mut [self.left.as_mut()],
            )
            .await;
            return Ok((more_rows_needed, failed_on_cond));
        }
        Ok((true, failed_on_cond))
    }

    /// Streams the left input against the hash table, emitting the rendered
    /// pair for every match whose ON condition passes. For LEFT OUTER and
    /// FULL OUTER, a left row without matches is emitted against an all-NULL
    /// right side. After the left input is exhausted, RIGHT OUTER and FULL
    /// OUTER sweep the buckets (in unspecified order) and emit every right
    /// row that never saw a passing match, padded with an all-NULL left side.
    ///
    /// The return contract is symmetric with [`Self::build_phase`]:
    /// `Ok(false)` means the inputs and the output are drained and closed.
    async fn probe_phase(&mut self) -> Result<bool> {
        let mut scratch = Vec::new();
        loop {
            let Some(msg) = self.left.next().await else {
                break;
            };
            let lrow = match msg {
                StreamMessage::Meta(StreamMetadata::Error(err)) => return Err(err),
                meta @ StreamMessage::Meta(_) => {
                    if !emit_helper(
                        self.base.output.as_mut(),
                        meta,
                        &mut [self.left.as_mut(), self.right.as_mut()],
                    )
                    .await
                    {
                        return Ok(false);
                    }
                    continue;
                }
                StreamMessage::Row(row) => row,
            };

            scratch.clear();
            let has_null =
                encode_columns_of_row(&lrow, &self.left_eq_cols, false, &mut scratch)?;
            if has_null {
                // A row with a NULL in an equality column will not match
                // anything. Output it or throw it away.
                if self.base.join_type.emits_unmatched_left() {
                    let (more_rows_needed, _) = self.render_and_emit(Some(&lrow), None).await?;
                    if !more_rows_needed {
                        return Ok(false);
                    }
                }
                continue;
            }

            if let Some(bucket) = self.buckets.get_mut(scratch.as_slice()) {
                // Matches are emitted in the order the right rows arrived.
                for i in 0..bucket.rows.len() {
                    let (row, failed_on_cond) = {
                        let rrow = self.rows.row(bucket.rows[i]);
                        self.base.render(Some(&lrow), Some(rrow))?
                    };
                    if let Some(row) = row {
                        if !emit_helper(
                            self.base.output.as_mut(),
                            StreamMessage::Row(row),
                            &mut [self.left.as_mut()],
                        )
                        .await
                        {
                            return Ok(false);
                        }
                    }
                    if !failed_on_cond && self.base.join_type.emits_unmatched_right() {
                        bucket.seen[i] = true;
                    }
                }
            } else if self.base.join_type.emits_unmatched_left() {
                let (more_rows_needed, _) = self.render_and_emit(Some(&lrow), None).await?;
                if !more_rows_needed {
                    return Ok(false);
                }
            }
        }

        if self.base.join_type.emits_unmatched_right() {
            // Produce results for the right rows that never saw a passing
            // match. Iteration order across buckets is unspecified.
            let unmatched: Vec<usize> = self
                .buckets
                .values()
                .flat_map(|bucket| bucket.rows.iter().zip(bucket.seen.iter()))
                .filter(|(_, &seen)| !seen)
                .map(|(&row_idx, _)| row_idx)
                .collect();
            for row_idx in unmatched {
                let (more_rows_needed, _) = self.render_and_emit(None, Some(row_idx)).await?;
                if !more_rows_needed {
                    return Ok(false);
                }
            }
        }
        self.base.output.close(None).await;
        Ok(false)
    }
}

#[async_trait]
impl Processor for HashJoiner {
    /// Runs the join to completion: build phase, outer-join bookkeeping,
    /// probe phase. Every exit path leaves both inputs drained, the output
    /// closed, and the memory reservations released (the container and the
    /// buckets account free when the joiner drops).
    async fn run(mut self: Box<Self>) {
        debug!("starting hash joiner run");
        match self.build_phase().await {
            Err(err) => {
                // Any error encountered while draining is swallowed; the
                // consumer sees the original error as the close cause.
                debug!("build phase error: {err}");
                drain_and_close(
                    self.base.output.as_mut(),
                    Some(err),
                    &mut [self.left.as_mut(), self.right.as_mut()],
                )
                .await;
                return;
            }
            Ok(false) => {
                debug!("exiting hash joiner run");
                return;
            }
            Ok(true) => {}
        }

        if self.base.join_type.emits_unmatched_right() {
            if let Err(err) = self.alloc_seen() {
                // The right input is already consumed; only the left remains.
                drain_and_close(
                    self.base.output.as_mut(),
                    Some(err),
                    &mut [self.left.as_mut()],
                )
                .await;
                return;
            }
        }
        debug!("build phase complete");

        match self.probe_phase().await {
            Ok(false) => {}
            Ok(true) => {
                drain_and_close(self.base.output.as_mut(), None, &mut [self.left.as_mut()])
                    .await;
            }
            Err(err) => {
                debug!("probe phase error: {err}");
                drain_and_close(
                    self.base.output.as_mut(),
                    Some(err),
                    &mut [self.left.as_mut()],
                )
                .await;
            }
        }
        debug!("exiting hash joiner run");
    }
}
