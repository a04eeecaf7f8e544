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

//! The ordered-key encoding.
//!
//! Serializes datums into byte strings such that byte equality implies value
//! equality and byte order follows value order. Each encoding is
//! self-delimiting, so the concatenation of several encoded columns is itself
//! comparable byte-for-byte. The hash join keys its buckets on these bytes and
//! the hash router feeds them to its hash function; since multiple nodes may
//! hash the same data, the encoding must be identical everywhere and is fixed
//! at plan time.

use crate::datum::{Datum, Row};
use crate::error::{Result, RowFlowError};

// Tag bytes. NULL sorts before every other value.
const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_TEXT: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;

// Byte-string payloads escape 0x00 as (0x00, 0xFF) and close with the
// terminator (0x00, 0x01), so a payload that is a prefix of another still
// compares below it and no encoding is a prefix of another.
const ESCAPE: u8 = 0x00;
const ESCAPED_00: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

impl Datum {
    /// Appends the ordered-key encoding of this datum to `appendto`.
    pub fn encode_key(&self, appendto: &mut Vec<u8>) -> Result<()> {
        match self {
            Datum::Null => appendto.push(TAG_NULL),
            Datum::Bool(v) => {
                appendto.push(TAG_BOOL);
                appendto.push(u8::from(*v));
            }
            Datum::Int(v) => {
                appendto.push(TAG_INT);
                // Flipping the sign bit makes the big-endian bytes of an i64
                // sort in value order.
                appendto.extend_from_slice(&((*v as u64) ^ (1 << 63)).to_be_bytes());
            }
            Datum::Float(v) => {
                appendto.push(TAG_FLOAT);
                let bits = v.to_bits();
                // Negative floats sort reversed on their raw bits; flip all
                // bits for negatives and only the sign bit otherwise.
                let ordered = if bits & (1 << 63) != 0 { !bits } else { bits ^ (1 << 63) };
                appendto.extend_from_slice(&ordered.to_be_bytes());
            }
            Datum::Text(v) => {
                appendto.push(TAG_TEXT);
                encode_escaped(v.as_bytes(), appendto);
            }
            Datum::Bytes(v) => {
                appendto.push(TAG_BYTES);
                encode_escaped(v, appendto);
            }
        }
        Ok(())
    }
}

fn encode_escaped(payload: &[u8], appendto: &mut Vec<u8>) {
    for &b in payload {
        if b == ESCAPE {
            appendto.push(ESCAPE);
            appendto.push(ESCAPED_00);
        } else {
            appendto.push(b);
        }
    }
    appendto.push(ESCAPE);
    appendto.push(TERMINATOR);
}

/// Appends the ordered-key encoding of the given columns of `row`, in order.
///
/// If a referenced column is NULL and `encode_null` is false, encoding stops
/// and `Ok(true)` is returned; the contents of `appendto` are then unspecified
/// and must not be used. With `encode_null` set, NULL encodes as a distinct
/// value and the result is never `true`. The caller owns `appendto` and is
/// expected to `clear()` and reuse it across calls to amortize its capacity.
pub fn encode_columns_of_row(
    row: &Row,
    cols: &[usize],
    encode_null: bool,
    appendto: &mut Vec<u8>,
) -> Result<bool> {
    for &col in cols {
        let datum = row.get(col).ok_or_else(|| {
            RowFlowError::Internal(format!(
                "column {col} out of range for row with {} columns",
                row.len()
            ))
        })?;
        if datum.is_null() && !encode_null {
            return Ok(true);
        }
        // A VALUE-style encoding would embed column identifiers, which vary
        // between plans; only the key encoding is comparable byte-for-byte.
        datum.encode_key(appendto)?;
    }
    Ok(false)
}
