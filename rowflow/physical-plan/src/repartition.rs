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

//! Routers direct a processor's outgoing rows to (potentially) several
//! downstream streams.
//!
//! The BY-HASH router partitions on the ordered-key encoding of the
//! configured hash columns, the same encoding the hash join keys its buckets
//! on. Multiple nodes may partition the same data, so the stream choice must
//! be a pure function of the row's encoded bytes.

use async_trait::async_trait;
use rowflow_common::key_encoding::encode_columns_of_row;
use rowflow_common::{config_err, not_impl_err, Result, RowFlowError};

use crate::stream::{RowReceiver, StreamMessage};

/// How a router chooses the downstream stream for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingPolicy {
    /// Partition on a CRC32-C hash of the configured hash columns.
    ByHash,
    /// Replicate every row to every stream.
    Mirror,
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterSpec {
    pub policy: RoutingPolicy,
    /// Column indices fed to the hash, in order. Ignored by the pass-through
    /// case of a single stream.
    pub hash_columns: Vec<usize>,
}

/// Builds a receiver fanning rows out to `streams` according to `spec`.
///
/// A single stream needs no routing and is returned as-is.
pub fn make_router(
    spec: RouterSpec,
    mut streams: Vec<Box<dyn RowReceiver>>,
) -> Result<Box<dyn RowReceiver>> {
    match streams.len() {
        0 => config_err!("no streams in router"),
        1 => Ok(streams.remove(0)),
        _ => match spec.policy {
            RoutingPolicy::ByHash => Ok(Box::new(HashRouter::try_new(spec.hash_columns, streams)?)),
            policy => not_impl_err!("router policy {policy:?} not supported"),
        },
    }
}

/// Routes each row to `streams[crc32c(encoded hash columns) % N]`.
pub struct HashRouter {
    hash_cols: Vec<usize>,
    streams: Vec<Box<dyn RowReceiver>>,
    buffer: Vec<u8>,
    /// The first error this router ran into. Once set, every subsequent push
    /// is refused and the error takes precedence over the close cause.
    err: Option<RowFlowError>,
}

impl HashRouter {
    fn try_new(hash_cols: Vec<usize>, streams: Vec<Box<dyn RowReceiver>>) -> Result<Self> {
        if hash_cols.is_empty() {
            return config_err!("no hash columns for BY-HASH router");
        }
        Ok(Self {
            hash_cols,
            streams,
            buffer: Vec::new(),
            err: None,
        })
    }
}

#[async_trait]
impl RowReceiver for HashRouter {
    async fn push(&mut self, msg: StreamMessage) -> bool {
        if self.err.is_some() {
            return false;
        }
        let row = match msg {
            StreamMessage::Row(row) => row,
            meta @ StreamMessage::Meta(_) => {
                // Metadata is not partitioned; forward it on the first stream.
                let _ = self.streams[0].push(meta).await;
                return true;
            }
        };
        for &col in &self.hash_cols {
            if col >= row.len() {
                self.err = Some(RowFlowError::Configuration(format!(
                    "hash column {col}, stream with only {} columns",
                    row.len()
                )));
                return false;
            }
        }

        self.buffer.clear();
        // A NULL hash column still routes: encoded as a distinct value, it
        // lands on the same stream on every node.
        if let Err(err) = encode_columns_of_row(&row, &self.hash_cols, true, &mut self.buffer) {
            self.err = Some(err);
            return false;
        }

        // CRC32-C makes for a decent hash and is hardware accelerated on
        // recent CPUs; determinism across nodes is what rules out a seeded
        // hasher here.
        let stream_idx = crc32c::crc32c(&self.buffer) as usize % self.streams.len();

        // We can't return false just because this stream needs no more rows.
        // We could only return false once all streams returned false, but
        // that seems of limited benefit.
        let _ = self.streams[stream_idx].push(StreamMessage::Row(row)).await;
        true
    }

    async fn close(&mut self, cause: Option<RowFlowError>) {
        // Any error the router ran into takes precedence.
        let cause = self.err.take().or(cause);
        for stream in &mut self.streams {
            stream.close(cause.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use rowflow_common::Row;

    use super::*;
    use crate::test_util::{int_text_row, int_text_types, RowBuffer};

    fn make_buffers(n: usize) -> (Vec<RowBuffer>, Vec<Box<dyn RowReceiver>>) {
        let handles: Vec<RowBuffer> = (0..n).map(|_| RowBuffer::new(int_text_types())).collect();
        let receivers = handles
            .iter()
            .map(|buffer| Box::new(buffer.clone()) as Box<dyn RowReceiver>)
            .collect();
        (handles, receivers)
    }

    fn by_hash(cols: Vec<usize>) -> RouterSpec {
        RouterSpec {
            policy: RoutingPolicy::ByHash,
            hash_columns: cols,
        }
    }

    async fn route_all(router: &mut Box<dyn RowReceiver>, rows: Vec<Row>) {
        for row in rows {
            assert!(router.push(StreamMessage::Row(row)).await);
        }
    }

    #[tokio::test]
    async fn zero_streams_is_a_configuration_error() {
        let err = make_router(by_hash(vec![0]), Vec::new()).err().unwrap();
        assert!(matches!(err, RowFlowError::Configuration(_)));
    }

    #[tokio::test]
    async fn no_hash_columns_is_a_configuration_error() {
        let (_handles, receivers) = make_buffers(2);
        let err = make_router(by_hash(Vec::new()), receivers).err().unwrap();
        assert!(matches!(err, RowFlowError::Configuration(_)));
    }

    #[tokio::test]
    async fn unsupported_policy_is_rejected() {
        let (_handles, receivers) = make_buffers(2);
        let spec = RouterSpec {
            policy: RoutingPolicy::Mirror,
            hash_columns: vec![0],
        };
        let err = make_router(spec, receivers).err().unwrap();
        assert!(matches!(err, RowFlowError::NotImplemented(_)));
    }

    #[tokio::test]
    async fn single_stream_is_a_pass_through() {
        let (handles, receivers) = make_buffers(1);
        let mut router = make_router(by_hash(vec![0]), receivers).unwrap();
        route_all(
            &mut router,
            vec![int_text_row(Some(1), "a"), int_text_row(Some(2), "b")],
        )
        .await;
        router.close(None).await;
        assert_eq!(handles[0].pushed_rows().len(), 2);
        assert!(handles[0].closed());
    }

    #[tokio::test]
    async fn identical_inputs_route_identically() {
        let rows: Vec<Row> = (0..64)
            .map(|i| int_text_row(Some(i * 37), "payload"))
            .collect();

        let (first_handles, receivers) = make_buffers(4);
        let mut first = make_router(by_hash(vec![0]), receivers).unwrap();
        route_all(&mut first, rows.clone()).await;

        let (second_handles, receivers) = make_buffers(4);
        let mut second = make_router(by_hash(vec![0]), receivers).unwrap();
        route_all(&mut second, rows).await;

        for (a, b) in first_handles.iter().zip(second_handles.iter()) {
            assert_eq!(a.pushed_rows(), b.pushed_rows());
        }
    }

    #[tokio::test]
    async fn equal_keys_share_a_stream() {
        let (handles, receivers) = make_buffers(4);
        let mut router = make_router(by_hash(vec![0]), receivers).unwrap();
        // Same first column, different second: the hash only sees column 0.
        route_all(
            &mut router,
            vec![int_text_row(Some(7), "a"), int_text_row(Some(7), "b")],
        )
        .await;
        let occupied: Vec<usize> = handles
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.pushed_rows().is_empty())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(occupied.len(), 1);
        assert_eq!(handles[occupied[0]].pushed_rows().len(), 2);
    }

    #[tokio::test]
    async fn null_hash_columns_still_route() {
        let (handles, receivers) = make_buffers(4);
        let mut router = make_router(by_hash(vec![0]), receivers).unwrap();
        route_all(
            &mut router,
            vec![int_text_row(None, "a"), int_text_row(None, "b")],
        )
        .await;
        let routed: usize = handles.iter().map(|h| h.pushed_rows().len()).sum();
        assert_eq!(routed, 2);
        // NULL keys are equal keys; both land on the same stream.
        assert!(handles.iter().any(|h| h.pushed_rows().len() == 2));
    }

    #[tokio::test]
    async fn out_of_range_hash_column_is_sticky() {
        let (handles, receivers) = make_buffers(2);
        let mut router = make_router(by_hash(vec![5]), receivers).unwrap();

        assert!(!router.push(StreamMessage::Row(int_text_row(Some(1), "a"))).await);
        // The error sticks: a well-formed push is refused too.
        assert!(!router.push(StreamMessage::Row(int_text_row(Some(2), "b"))).await);

        router.close(None).await;
        for handle in &handles {
            assert!(handle.pushed_rows().is_empty());
            assert!(matches!(
                handle.close_cause(),
                Some(RowFlowError::Configuration(_))
            ));
        }
    }

    #[tokio::test]
    async fn sticky_error_takes_precedence_over_close_cause() {
        let (handles, receivers) = make_buffers(2);
        let mut router = make_router(by_hash(vec![5]), receivers).unwrap();
        assert!(!router.push(StreamMessage::Row(int_text_row(Some(1), "a"))).await);

        router
            .close(Some(RowFlowError::Execution(String::from("caller cause"))))
            .await;
        for handle in &handles {
            assert!(matches!(
                handle.close_cause(),
                Some(RowFlowError::Configuration(_))
            ));
        }
    }

    #[tokio::test]
    async fn close_cause_reaches_every_stream() {
        let (handles, receivers) = make_buffers(3);
        let mut router = make_router(by_hash(vec![0]), receivers).unwrap();
        router
            .close(Some(RowFlowError::Execution(String::from("upstream died"))))
            .await;
        for handle in &handles {
            assert!(handle.closed());
            assert_eq!(
                handle.close_cause(),
                Some(RowFlowError::Execution(String::from("upstream died")))
            );
        }
    }

    #[tokio::test]
    async fn declining_downstream_does_not_stop_the_router() {
        let handles: Vec<RowBuffer> = vec![
            RowBuffer::new(int_text_types()).with_accept_limit(0),
            RowBuffer::new(int_text_types()).with_accept_limit(0),
        ];
        let receivers: Vec<Box<dyn RowReceiver>> = handles
            .iter()
            .map(|buffer| Box::new(buffer.clone()) as Box<dyn RowReceiver>)
            .collect();
        let mut router = make_router(by_hash(vec![0]), receivers).unwrap();
        // Both downstreams refuse everything; the router still reports alive.
        assert!(router.push(StreamMessage::Row(int_text_row(Some(1), "a"))).await);
        assert!(router.push(StreamMessage::Row(int_text_row(Some(2), "b"))).await);
    }

    #[tokio::test]
    async fn hash_distribution_is_roughly_uniform() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        const STREAMS: usize = 4;
        const ROWS: usize = 20_000;

        let (handles, receivers) = make_buffers(STREAMS);
        let mut router = make_router(by_hash(vec![0]), receivers).unwrap();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..ROWS {
            let row = int_text_row(Some(rng.gen_range(i64::MIN..i64::MAX)), "r");
            assert!(router.push(StreamMessage::Row(row)).await);
        }

        // Chi-squared over the per-stream counts, 3 degrees of freedom. The
        // threshold is far out in the tail for a uniform hash.
        let expected = (ROWS / STREAMS) as f64;
        let chi_squared: f64 = handles
            .iter()
            .map(|h| {
                let observed = h.pushed_rows().len() as f64;
                (observed - expected) * (observed - expected) / expected
            })
            .sum();
        assert!(
            chi_squared < 25.0,
            "per-stream counts too skewed: chi^2 = {chi_squared}"
        );
        let routed: usize = handles.iter().map(|h| h.pushed_rows().len()).sum();
        assert_eq!(routed, ROWS);
    }

    #[tokio::test]
    async fn metadata_is_forwarded_unpartitioned() {
        use crate::stream::StreamMetadata;

        let (handles, receivers) = make_buffers(2);
        let mut router = make_router(by_hash(vec![0]), receivers).unwrap();
        assert!(
            router
                .push(StreamMessage::Meta(StreamMetadata::Trace(String::from(
                    "progress"
                ))))
                .await
        );
        assert_eq!(handles[0].pushed_meta().len(), 1);
        assert!(handles[1].pushed_meta().is_empty());
    }
}
