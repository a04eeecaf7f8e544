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

//! Utilities for testing the physical operators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rowflow_common::{ColumnType, Datum, Row, RowFlowError};

use crate::stream::{RowReceiver, RowSource, StreamMessage, StreamMetadata};

/// An in-memory stream endpoint for tests.
///
/// Acts as a [`RowSource`] over pre-loaded messages and as a [`RowReceiver`]
/// that records everything pushed to it. Clones share state, so a test can
/// hand one handle to an operator and keep another for assertions.
#[derive(Debug, Clone)]
pub struct RowBuffer {
    types: Vec<ColumnType>,
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    to_produce: VecDeque<StreamMessage>,
    pushed_rows: Vec<Row>,
    pushed_meta: Vec<StreamMetadata>,
    closed: bool,
    close_cause: Option<RowFlowError>,
    accept_limit: Option<usize>,
}

impl RowBuffer {
    /// An empty buffer, typically used as an output.
    pub fn new(types: Vec<ColumnType>) -> Self {
        Self::with_messages(types, Vec::new())
    }

    /// A buffer that will produce the given rows followed by end-of-stream.
    pub fn with_rows(types: Vec<ColumnType>, rows: Vec<Row>) -> Self {
        Self::with_messages(types, rows.into_iter().map(StreamMessage::Row).collect())
    }

    /// A buffer that will produce the given messages followed by
    /// end-of-stream.
    pub fn with_messages(types: Vec<ColumnType>, messages: Vec<StreamMessage>) -> Self {
        Self {
            types,
            inner: Arc::new(Mutex::new(Inner {
                to_produce: messages.into(),
                ..Inner::default()
            })),
        }
    }

    /// Declines every push after the first `limit` have been accepted.
    pub fn with_accept_limit(self, limit: usize) -> Self {
        self.inner.lock().unwrap().accept_limit = Some(limit);
        self
    }

    pub fn remaining_to_produce(&self) -> usize {
        self.inner.lock().unwrap().to_produce.len()
    }

    pub fn pushed_rows(&self) -> Vec<Row> {
        self.inner.lock().unwrap().pushed_rows.clone()
    }

    pub fn pushed_meta(&self) -> Vec<StreamMetadata> {
        self.inner.lock().unwrap().pushed_meta.clone()
    }

    pub fn closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn close_cause(&self) -> Option<RowFlowError> {
        self.inner.lock().unwrap().close_cause.clone()
    }
}

#[async_trait]
impl RowSource for RowBuffer {
    fn types(&self) -> &[ColumnType] {
        &self.types
    }

    async fn next(&mut self) -> Option<StreamMessage> {
        self.inner.lock().unwrap().to_produce.pop_front()
    }
}

#[async_trait]
impl RowReceiver for RowBuffer {
    async fn push(&mut self, msg: StreamMessage) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return false;
        }
        if let Some(limit) = &mut inner.accept_limit {
            if *limit == 0 {
                return false;
            }
            *limit -= 1;
        }
        match msg {
            StreamMessage::Row(row) => inner.pushed_rows.push(row),
            StreamMessage::Meta(meta) => inner.pushed_meta.push(meta),
        }
        true
    }

    async fn close(&mut self, cause: Option<RowFlowError>) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.closed {
            inner.closed = true;
            inner.close_cause = cause;
        }
    }
}

/// Builds an `(Int, Text)` row, the two-column shape most operator tests use;
/// `None` stands for a NULL first column.
pub fn int_text_row(a: Option<i64>, b: &str) -> Row {
    vec![a.map(Datum::Int).unwrap_or(Datum::Null), Datum::from(b)]
}

/// Column types matching [`int_text_row`].
pub fn int_text_types() -> Vec<ColumnType> {
    vec![ColumnType::Int, ColumnType::Text]
}
