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

//! Row streams: the producer and consumer interfaces operators are wired
//! with, and the in-process channel connecting them.
//!
//! A stream carries rows interleaved with [`StreamMetadata`] records.
//! Metadata either terminates the stream (an error from upstream) or is
//! passthrough payload (tracing, progress) that operators forward without
//! interpreting. End-of-stream is the absence of a next message.

use async_trait::async_trait;
use rowflow_common::{ColumnType, Row, RowFlowError};
use tokio::sync::mpsc;

/// Out-of-band records traveling in-band with the rows of a stream.
#[derive(Debug, Clone)]
pub enum StreamMetadata {
    /// A terminal error observed by the producer. Consumers stop processing
    /// and propagate it.
    Error(RowFlowError),
    /// Passthrough tracing payload; forwarded downstream, never interpreted.
    Trace(String),
}

/// One item of a row stream.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    Row(Row),
    Meta(StreamMetadata),
}

/// A producer of rows, pulled by the operator consuming it.
#[async_trait]
pub trait RowSource: Send {
    /// Column types of the rows this source produces.
    fn types(&self) -> &[ColumnType];

    /// Returns the next message, or `None` once the stream is exhausted.
    /// May suspend waiting for upstream production.
    async fn next(&mut self) -> Option<StreamMessage>;
}

/// A consumer of rows, pushed to by the operator producing them.
#[async_trait]
pub trait RowReceiver: Send {
    /// Delivers one message. Returns `false` once the consumer needs no more
    /// rows; the producer must then drain its own inputs and close.
    /// May suspend waiting for downstream consumption.
    async fn push(&mut self, msg: StreamMessage) -> bool;

    /// Closes the stream. A `Some` cause is delivered to the consumer as the
    /// reason the stream ended. Closing twice is a no-op.
    async fn close(&mut self, cause: Option<RowFlowError>);
}

/// Creates a bounded in-process row channel.
///
/// The sending half is a [`RowReceiver`], the receiving half a [`RowSource`];
/// a full channel suspends the producer, which is how backpressure reaches
/// it. Dropping the receiving half makes `push` return `false`, and dropping
/// the sending half without closing reads as end-of-stream; either is how a
/// cancelled peer is observed.
pub fn row_channel(
    types: Vec<ColumnType>,
    capacity: usize,
) -> (RowChannelSender, RowChannelReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        RowChannelSender { tx: Some(tx) },
        RowChannelReceiver { types, rx },
    )
}

/// Sending half of a [`row_channel`].
#[derive(Debug)]
pub struct RowChannelSender {
    tx: Option<mpsc::Sender<StreamMessage>>,
}

#[async_trait]
impl RowReceiver for RowChannelSender {
    async fn push(&mut self, msg: StreamMessage) -> bool {
        match &self.tx {
            Some(tx) => tx.send(msg).await.is_ok(),
            None => false,
        }
    }

    async fn close(&mut self, cause: Option<RowFlowError>) {
        if let Some(tx) = self.tx.take() {
            if let Some(err) = cause {
                // Best effort: the receiver may already be gone.
                let _ = tx.send(StreamMessage::Meta(StreamMetadata::Error(err))).await;
            }
        }
    }
}

/// Receiving half of a [`row_channel`].
#[derive(Debug)]
pub struct RowChannelReceiver {
    types: Vec<ColumnType>,
    rx: mpsc::Receiver<StreamMessage>,
}

#[async_trait]
impl RowSource for RowChannelReceiver {
    fn types(&self) -> &[ColumnType] {
        &self.types
    }

    async fn next(&mut self) -> Option<StreamMessage> {
        self.rx.recv().await
    }
}
