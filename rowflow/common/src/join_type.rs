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

//! Defines the [`JoinType`] supported by the join operators.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::RowFlowError;

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    /// Inner join: only row pairs whose equality columns match and whose ON
    /// condition passes are returned.
    Inner,
    /// Left outer join: additionally returns every left row without a match,
    /// padded with NULL values for the right columns.
    Left,
    /// Right outer join: additionally returns every right row without a
    /// match, padded with NULL values for the left columns.
    Right,
    /// Full outer join: unmatched rows of both sides are returned, each
    /// padded with NULL values for the other side.
    Full,
}

impl JoinType {
    /// True if unmatched left rows are emitted padded with NULLs.
    pub fn emits_unmatched_left(self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }

    /// True if unmatched right rows are emitted padded with NULLs.
    pub fn emits_unmatched_right(self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }
}

impl Display for JoinType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            JoinType::Inner => "Inner",
            JoinType::Left => "Left",
            JoinType::Right => "Right",
            JoinType::Full => "Full",
        };
        write!(f, "{name}")
    }
}

impl FromStr for JoinType {
    type Err = RowFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INNER" => Ok(JoinType::Inner),
            "LEFT" => Ok(JoinType::Left),
            "RIGHT" => Ok(JoinType::Right),
            "FULL" => Ok(JoinType::Full),
            _ => Err(RowFlowError::NotImplemented(format!(
                "unsupported join type: {s}"
            ))),
        }
    }
}
