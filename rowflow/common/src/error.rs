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

//! Error types for the RowFlow crates.
//!
//! [`RowFlowError`] distinguishes expected errors (invalid configuration,
//! exhausted resources, runtime evaluation failures) from unexpected ones
//! ([`RowFlowError::Internal`]), which indicate a broken invariant and thus a
//! bug. Convenience macros exist for each variant: use `exec_err!` for
//! expected runtime errors and `internal_err!` for invariant checks.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::result;

/// Result type for operations that could result in a [`RowFlowError`].
pub type Result<T, E = RowFlowError> = result::Result<T, E>;

/// RowFlow error.
///
/// Every variant carries its description as an owned string, which keeps the
/// error `Clone`: a single close cause may need to be delivered to several
/// downstream streams, and a router replays its sticky error at close time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFlowError {
    /// Error when a feature is recognized but not yet implemented.
    NotImplemented(String),
    /// Error due to bugs in RowFlow.
    ///
    /// This error should not happen in normal usage. It results from a broken
    /// internal invariant that the compiler is not able to check.
    Internal(String),
    /// Error during execution: the ON condition, a projection, or a datum
    /// encoding failed at runtime.
    Execution(String),
    /// Error for invalid or unsupported configuration options.
    Configuration(String),
    /// Error when resources (such as memory) are exhausted.
    ///
    /// Returned when an operator cannot acquire additional memory for its
    /// reservation from the memory pool.
    ResourcesExhausted(String),
}

impl Display for RowFlowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RowFlowError::NotImplemented(desc) => {
                write!(f, "This feature is not implemented: {desc}")
            }
            RowFlowError::Internal(desc) => {
                write!(
                    f,
                    "Internal error: {desc}. This was likely caused by a bug in \
                     RowFlow's code and we would welcome that you file a bug report \
                     in our issue tracker"
                )
            }
            RowFlowError::Execution(desc) => write!(f, "Execution error: {desc}"),
            RowFlowError::Configuration(desc) => {
                write!(f, "Invalid or Unsupported Configuration: {desc}")
            }
            RowFlowError::ResourcesExhausted(desc) => {
                write!(f, "Resources exhausted: {desc}")
            }
        }
    }
}

impl Error for RowFlowError {}

/// Macro wraps `Err(RowFlowError::Internal)` with a formatted message.
#[macro_export]
macro_rules! internal_err {
    ($($args:expr),* $(,)?) => {
        Err($crate::error::RowFlowError::Internal(format!($($args),*)))
    };
}

/// Macro wraps `Err(RowFlowError::NotImplemented)` with a formatted message.
#[macro_export]
macro_rules! not_impl_err {
    ($($args:expr),* $(,)?) => {
        Err($crate::error::RowFlowError::NotImplemented(format!($($args),*)))
    };
}

/// Macro wraps `Err(RowFlowError::Execution)` with a formatted message.
#[macro_export]
macro_rules! exec_err {
    ($($args:expr),* $(,)?) => {
        Err($crate::error::RowFlowError::Execution(format!($($args),*)))
    };
}

/// Macro wraps `Err(RowFlowError::Configuration)` with a formatted message.
#[macro_export]
macro_rules! config_err {
    ($($args:expr),* $(,)?) => {
        Err($crate::error::RowFlowError::Configuration(format!($($args),*)))
    };
}

/// Macro wraps `Err(RowFlowError::ResourcesExhausted)` with a formatted message.
#[macro_export]
macro_rules! resources_err {
    ($($args:expr),* $(,)?) => {
        Err($crate::error::RowFlowError::ResourcesExhausted(format!($($args),*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            RowFlowError::Execution(String::from("out of bounds")).to_string(),
            "Execution error: out of bounds"
        );
        assert_eq!(
            RowFlowError::ResourcesExhausted(String::from("no memory")).to_string(),
            "Resources exhausted: no memory"
        );
        assert!(RowFlowError::Internal(String::from("oops"))
            .to_string()
            .starts_with("Internal error: oops"));
    }

    #[test]
    fn error_macros() {
        let res: Result<()> = exec_err!("divide by {}", 0);
        assert_eq!(
            res.unwrap_err(),
            RowFlowError::Execution(String::from("divide by 0"))
        );
        let res: Result<()> = config_err!("no streams in router");
        assert_eq!(
            res.unwrap_err(),
            RowFlowError::Configuration(String::from("no streams in router"))
        );
    }
}
