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

//! RowFlow physical operators.
//!
//! Operators are wired together with [row streams](crate::stream): a
//! [`RowSource`](crate::stream::RowSource) is pulled for rows and in-band
//! metadata, a [`RowReceiver`](crate::stream::RowReceiver) is pushed to and
//! eventually closed. The [hash join](crate::joins::hash_join::HashJoiner)
//! consumes two sources and drives one receiver; the
//! [hash router](crate::repartition) fans one stream out across several
//! receivers by a deterministic column hash.

pub mod common;
pub mod joins;
pub mod repartition;
pub mod stream;

#[cfg(test)]
mod test_util;

use async_trait::async_trait;

/// A physical operator bound to its inputs and output.
///
/// Each processor executes as a single cooperative task: it pulls rows from
/// its inputs, pushes rows and metadata to its output, and owns its inputs
/// and output exclusively for the duration of [`run`](Processor::run).
/// Pulling and pushing are the operator's suspension points.
#[async_trait]
pub trait Processor: Send {
    /// Runs the processor to completion. By the time `run` returns, the
    /// inputs are drained and the output has been closed, either normally or
    /// with the first error the processor observed.
    async fn run(self: Box<Self>);
}
