// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::path::PathBuf;
use svc_proxy::{ConfigError, ProxyError};

/// Errors that stop the agent.
#[derive(Debug, thiserror::Error)]
pub(crate) enum AgentError {
    #[error("failed to read {path:?}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("service '{service}': {source}")]
    Service {
        service: String,
        #[source]
        source: ConfigError,
    },
    #[error("invalid proxy parameters: {0}")]
    Params(String),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error("failed to initialize logging: {0}")]
    Logging(String),
    #[error("failed to set the termination handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("failed to start the runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
