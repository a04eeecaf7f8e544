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

//! Pieces shared by the physical operators: the row container backing the
//! hash join and the emit/drain helpers every exit path funnels through.

use log::trace;
use rowflow_common::{row_size, Result, Row, RowFlowError};
use rowflow_execution::memory_pool::MemoryReservation;

use crate::stream::{RowReceiver, RowSource, StreamMessage, StreamMetadata};

/// An append-only indexed store of rows.
///
/// The container owns the datums of every row added to it until it is
/// dropped; buckets and other structures refer to rows by index. The rows'
/// footprint is attributed to the container's own reservation, which is
/// released back to the pool when the container drops.
#[derive(Debug)]
pub struct RowContainer {
    rows: Vec<Row>,
    reservation: MemoryReservation,
}

impl RowContainer {
    pub fn new(reservation: MemoryReservation) -> Self {
        Self {
            rows: Vec::new(),
            reservation,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends `row`, which takes index `len() - 1`. Fails without appending
    /// if the reservation refuses the row's footprint.
    pub fn add_row(&mut self, row: Row) -> Result<()> {
        self.reservation.try_grow(row_size(&row))?;
        self.rows.push(row);
        Ok(())
    }

    /// The row at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` was not handed out by [`Self::add_row`].
    pub fn row(&self, idx: usize) -> &Row {
        &self.rows[idx]
    }
}

/// Pushes one message to `out`. If the consumer declines further rows, drains
/// every source, closes `out` cleanly, and returns `false`; the operator has
/// nothing left to do. Returns `true` while the consumer accepts more.
pub async fn emit_helper(
    out: &mut dyn RowReceiver,
    msg: StreamMessage,
    sources: &mut [&mut dyn RowSource],
) -> bool {
    if out.push(msg).await {
        return true;
    }
    // Consumer is done; upstream producers must be told to stop producing.
    drain_and_close(out, None, sources).await;
    false
}

/// Drains every source to end-of-stream, then closes `out` with `cause`.
///
/// Rows pulled while draining are discarded; passthrough metadata is still
/// forwarded best-effort. Errors observed while draining are swallowed so
/// that `cause` is what the consumer sees.
pub async fn drain_and_close(
    out: &mut dyn RowReceiver,
    cause: Option<RowFlowError>,
    sources: &mut [&mut dyn RowSource],
) {
    for source in sources.iter_mut() {
        while let Some(msg) = source.next().await {
            match msg {
                StreamMessage::Row(_) => {}
                StreamMessage::Meta(StreamMetadata::Error(err)) => {
                    trace!("swallowing error while draining: {err}");
                }
                meta @ StreamMessage::Meta(_) => {
                    let _ = out.push(meta).await;
                }
            }
        }
    }
    out.close(cause).await;
}
