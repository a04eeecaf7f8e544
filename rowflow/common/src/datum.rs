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

//! The datum and row model.
//!
//! A [`Row`] is an ordered sequence of [`Datum`] values. Rows flow between
//! operators by value; an operator that buffers rows (such as the hash join's
//! row container) owns their datums for its lifetime and attributes their
//! footprint to a memory reservation via [`row_size`].

use std::fmt::{Display, Formatter};
use std::mem;

/// The type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Bytes,
    Bool,
}

/// A single value: either NULL or a typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl Datum {
    /// Returns true iff this datum is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Estimated in-memory footprint in bytes, including heap payloads.
    /// Used for memory accounting.
    pub fn size(&self) -> usize {
        let heap = match self {
            Datum::Text(s) => s.capacity(),
            Datum::Bytes(b) => b.capacity(),
            _ => 0,
        };
        mem::size_of::<Datum>() + heap
    }
}

impl Display for Datum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Int(v) => write!(f, "{v}"),
            Datum::Float(v) => write!(f, "{v}"),
            Datum::Text(v) => write!(f, "'{v}'"),
            Datum::Bytes(v) => write!(f, "x'{}'", hex(v)),
            Datum::Bool(v) => write!(f, "{v}"),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int(v)
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Float(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Text(v.to_string())
    }
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Datum::Bool(v)
    }
}

impl From<Vec<u8>> for Datum {
    fn from(v: Vec<u8>) -> Self {
        Datum::Bytes(v)
    }
}

/// A row is an ordered sequence of datums.
pub type Row = Vec<Datum>;

/// Estimated in-memory footprint of `row` in bytes.
pub fn row_size(row: &Row) -> usize {
    mem::size_of::<Row>() + row.iter().map(Datum::size).sum::<usize>()
}

/// An all-NULL row of the given width, used to pad the missing side of an
/// outer-join emission.
pub fn null_row(width: usize) -> Row {
    vec![Datum::Null; width]
}
