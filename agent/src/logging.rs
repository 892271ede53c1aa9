// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::error::AgentError;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Install the global subscriber. `RUST_LOG`, when set, overrides
/// `default_level`.
pub(crate) fn init_logging(default_level: &str) -> Result<(), AgentError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AgentError::Logging(e.to_string()))
}
