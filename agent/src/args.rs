// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use openflow::DatapathMode;
use std::path::{Path, PathBuf};

pub(crate) use clap::Parser;
#[derive(Parser, Debug)]
#[command(name = "svcproxy-agent")]
#[command(version)]
#[command(about = "Service load balancing agent of the fabric", long_about = None)]
pub(crate) struct CmdArgs {
    #[arg(long, value_name = "path to the YAML configuration")]
    config: PathBuf,
    #[arg(long, value_name = "datapath mode (vlan|vxlan|vrouter|vlrouter), overrides the config")]
    mode: Option<DatapathMode>,
    #[arg(long, value_name = "default log level, RUST_LOG takes precedence", default_value = "info")]
    log_level: String,
    #[arg(long, value_name = "apply the config, dump flows and state, then exit", default_value_t = false)]
    dry_run: bool,
}
impl CmdArgs {
    pub fn config(&self) -> &Path {
        &self.config
    }
    pub fn mode(&self) -> Option<DatapathMode> {
        self.mode
    }
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }
}
