// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::module_name_repetitions)]

mod args;
mod config;
mod error;
mod logging;
mod serve;

use crate::args::{CmdArgs, Parser};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::logging::init_logging;
use crate::serve::serve;

use openflow::SoftSwitch;
use std::process::ExitCode;
use std::sync::Arc;
use svc_proxy::{EndpointTable, ServiceProxy};
use tracing::{error, info, warn};

fn main() -> ExitCode {
    /* parse cmd line args */
    let args = CmdArgs::parse();

    /* initialize logging */
    if let Err(e) = init_logging(args.log_level()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    info!("Starting service proxy agent...");

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CmdArgs) -> Result<(), AgentError> {
    let config = AgentConfig::load(args.config())?;
    let mode = args.mode().unwrap_or(config.mode);
    let params = config.proxy.params()?;
    info!("{params}");

    let switch = Arc::new(SoftSwitch::new());
    let directory = Arc::new(EndpointTable::new());
    let proxy = ServiceProxy::new(switch.clone(), directory.clone(), params.clone());
    config.apply(mode, &proxy, &directory)?;

    if args.dry_run() {
        for flow in switch.dump_flows() {
            println!("{flow}");
        }
        dump_state(&proxy);
        return Ok(());
    }

    let (stop_tx, stop_rx) = tokio::sync::mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        if stop_tx.send(()).is_err() {
            warn!("agent already stopping");
        }
    })?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(AgentError::Runtime)?;
    runtime.block_on(serve(&proxy, &switch, stop_rx, params.stats_interval));

    info!("Shutting down service proxy agent");
    dump_state(&proxy);
    Ok(())
}

fn dump_state(proxy: &ServiceProxy) {
    match serde_yaml_ng::to_string(&proxy.inspect_state()) {
        Ok(yaml) => println!("{yaml}"),
        Err(e) => warn!("failed to dump proxy state: {e}"),
    }
}
