// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The service proxy.

use crate::catalogue::{Catalogue, ServiceSpec};
use crate::directory::{Endpoint, EndpointDirectory};
use crate::errors::ProxyError;
use crate::natflow::{NatContext, ServiceTables};
use crate::oper::OperState;
use crate::params::ProxyParams;
use crate::stats::{EndpointStats, StatsPoller, StatsStore};
use net::Mac;
use openflow::{
    FLOW_MISS_PRIORITY, FlowEntry, FlowId, FlowMatch, MultipartReply, Next, OfSwitch, TableId,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Everything the proxy mutates, behind one lock.
#[derive(Debug, Default)]
pub(crate) struct ProxyState {
    pub catalogue: Catalogue,
    pub oper: BTreeMap<IpAddr, OperState>,
    pub stats: StatsStore,
    pub tables: Option<ServiceTables>,
    pub miss_flows: Vec<FlowId>,
    pub poller: Option<StatsPoller>,
    pub connected: bool,
}

/// Load balances virtual services over their providers by programming NAT
/// flows in the switch.
///
/// Configuration (service specs, provider sets) can arrive in any order. A
/// service becomes active once it has both a spec and at least one provider:
/// its traffic is then punted to the controller until the first packet of a
/// client selects a provider and installs the NAT flows of that pairing.
pub struct ServiceProxy {
    pub(crate) params: ProxyParams,
    pub(crate) switch: Arc<dyn OfSwitch>,
    pub(crate) directory: Arc<dyn EndpointDirectory>,
    pub(crate) state: Mutex<ProxyState>,
}

impl std::fmt::Debug for ServiceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("params", &self.params)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ProxyState {
    pub(crate) fn nat_context<'a>(
        switch: &'a dyn OfSwitch,
        tables: Option<ServiceTables>,
        stats: &'a mut StatsStore,
    ) -> NatContext<'a> {
        NatContext {
            switch,
            tables,
            stats,
        }
    }

    /// Tear down and forget the operational state of `ip`.
    fn deactivate(&mut self, switch: &dyn OfSwitch, ip: IpAddr) {
        let Some(mut oper) = self.oper.remove(&ip) else {
            return;
        };
        info!("deactivating service {} ({ip})", oper.name);
        let mut ctx = Self::nat_context(switch, self.tables, &mut self.stats);
        oper.tear_down_service(&mut ctx);
    }

    /// Create the operational state of `name`: watch flows and providers.
    fn activate(
        &mut self,
        switch: &dyn OfSwitch,
        dnat_table: TableId,
        name: &str,
        spec: &ServiceSpec,
        providers: &BTreeSet<IpAddr>,
    ) -> Result<(), ProxyError> {
        if let Some(other) = self.oper.get(&spec.ip) {
            if other.name != name {
                return Err(ProxyError::ServiceIpInUse {
                    ip: spec.ip,
                    owner: other.name.clone(),
                });
            }
            return Ok(());
        }
        let mut oper = OperState::new(name, spec);
        oper.install_watch_flows(switch, dnat_table)?;
        for provider in providers {
            oper.add_provider(*provider);
        }
        info!(
            "activated service {name} ({}) with {} providers",
            spec.ip,
            providers.len()
        );
        self.oper.insert(spec.ip, oper);
        Ok(())
    }

    /// Whether the operational state of `name` matches its catalogue entry.
    fn is_consistent(&self, name: &str, spec: &ServiceSpec) -> bool {
        let active = self.oper.get(&spec.ip).is_some_and(|o| o.name == name);
        active || self.catalogue.providers(name).is_empty()
    }
}

impl ServiceProxy {
    #[must_use]
    pub fn new(
        switch: Arc<dyn OfSwitch>,
        directory: Arc<dyn EndpointDirectory>,
        params: ProxyParams,
    ) -> Self {
        Self {
            params,
            switch,
            directory,
            state: Mutex::new(ProxyState {
                connected: true,
                ..ProxyState::default()
            }),
        }
    }

    #[must_use]
    pub fn params(&self) -> &ProxyParams {
        &self.params
    }

    /// Install the table-miss flows of the DNAT and SNAT tables, chaining to
    /// `dnat_next` and `snat_next`. Reconfiguring replaces the miss flows.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Switch`] if a miss flow cannot be installed.
    #[tracing::instrument(level = "info", skip(self))]
    pub fn configure_service_tables(
        &self,
        dnat_next: TableId,
        snat_next: TableId,
    ) -> Result<(), ProxyError> {
        let mut state = self.state.lock();
        for id in state.miss_flows.drain(..) {
            if let Err(e) = self.switch.delete_flow(id) {
                debug!("failed to delete miss flow {id}: {e}");
            }
        }
        let tables = ServiceTables {
            dnat: self.params.dnat_table,
            snat: self.params.snat_table,
            dnat_next,
            snat_next,
        };
        for (table, next) in [(tables.dnat, dnat_next), (tables.snat, snat_next)] {
            let id = self.switch.install_flow(FlowEntry {
                table,
                priority: FLOW_MISS_PRIORITY,
                matcher: FlowMatch::default(),
                set_fields: vec![],
                next: Next::GotoTable(next),
            })?;
            state.miss_flows.push(id);
        }
        state.tables = Some(tables);
        Ok(())
    }

    /// Add or replace the spec of service `name`.
    ///
    /// An identical spec is a no-op. A different one tears down everything
    /// installed for the previous one before (re)activating the service.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] if the spec is invalid,
    /// [`ProxyError::ServiceIpInUse`] if another service claims the address,
    /// or [`ProxyError::FlowInstall`] if the watch flows cannot be installed.
    #[tracing::instrument(level = "info", skip(self, spec), fields(ip = %spec.ip))]
    pub fn add_service_spec(&self, name: &str, spec: ServiceSpec) -> Result<(), ProxyError> {
        spec.validate()?;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(owner) = state.catalogue.ip_owner(spec.ip, name) {
            return Err(ProxyError::ServiceIpInUse {
                ip: spec.ip,
                owner: owner.to_string(),
            });
        }

        if state.catalogue.spec(name) == Some(&spec) && state.is_consistent(name, &spec) {
            debug!("spec of {name} unchanged");
            return Ok(());
        }

        let ip = spec.ip;
        if let Some(old) = state.catalogue.set_spec(name, spec) {
            debug!("replacing spec of {name} ({} -> {ip})", old.ip);
            if state.oper.get(&old.ip).is_some_and(|o| o.name == name) {
                state.deactivate(&*self.switch, old.ip);
            }
        }

        let providers = state.catalogue.providers(name);
        if providers.is_empty() {
            debug!("service {name} has no providers yet");
            return Ok(());
        }
        let Some(spec) = state.catalogue.spec(name).cloned() else {
            return Ok(());
        };
        state.activate(&*self.switch, self.params.dnat_table, name, &spec, &providers)
    }

    /// Delete the spec of service `name`, with all its flows. Its providers
    /// stay in the catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::NoSuchService`] if `name` has no spec.
    #[tracing::instrument(level = "info", skip(self, spec))]
    pub fn delete_service_spec(&self, name: &str, spec: &ServiceSpec) -> Result<(), ProxyError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(current) = state.catalogue.remove_spec(name) else {
            return Err(ProxyError::NoSuchService(name.to_string()));
        };
        if current.ip != spec.ip {
            warn!(
                "deleting {name}: given address {} differs from configured {}",
                spec.ip, current.ip
            );
        }
        if state.oper.get(&current.ip).is_some_and(|o| o.name == name) {
            state.deactivate(&*self.switch, current.ip);
        }
        Ok(())
    }

    /// Replace the providers of service `name`.
    ///
    /// Removed providers lose all their pairings. An empty set deactivates
    /// the service.
    ///
    /// # Errors
    ///
    /// Returns an error if activating the service fails, see
    /// [`ServiceProxy::add_service_spec`].
    #[tracing::instrument(level = "info", skip(self, providers))]
    pub fn update_providers(
        &self,
        name: &str,
        providers: impl IntoIterator<Item = IpAddr>,
    ) -> Result<(), ProxyError> {
        let providers: BTreeSet<IpAddr> = providers.into_iter().collect();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.catalogue.set_providers(name, providers.clone());

        let Some(spec) = state.catalogue.spec(name).cloned() else {
            debug!("no spec for {name} yet, storing {} providers", providers.len());
            return Ok(());
        };

        if providers.is_empty() {
            if state.oper.get(&spec.ip).is_some_and(|o| o.name == name) {
                state.deactivate(&*self.switch, spec.ip);
            }
            return Ok(());
        }

        let active = state.oper.get(&spec.ip).is_some_and(|o| o.name == name);
        if !active {
            return state.activate(
                &*self.switch,
                self.params.dnat_table,
                name,
                &spec,
                &providers,
            );
        }
        let mut ctx = ProxyState::nat_context(&*self.switch, state.tables, &mut state.stats);
        if let Some(oper) = state.oper.get_mut(&spec.ip) {
            let current: Vec<IpAddr> = oper.providers.keys().copied().collect();
            for stale in current.into_iter().filter(|p| !providers.contains(p)) {
                info!("service {name}: removing provider {stale}");
                oper.tear_down_provider(&mut ctx, stale);
            }
            for provider in &providers {
                oper.add_provider(*provider);
            }
        }
        Ok(())
    }

    /// Remove every pairing of a client endpoint, in every service, and drop
    /// its statistics.
    #[tracing::instrument(level = "info", skip(self, endpoint), fields(ip = %endpoint.ip))]
    pub fn remove_client_endpoint(&self, endpoint: &Endpoint) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut ctx = ProxyState::nat_context(&*self.switch, state.tables, &mut state.stats);
        for oper in state.oper.values_mut() {
            oper.tear_down_client(&mut ctx, endpoint.ip);
        }
        state.stats.forget_endpoint(endpoint.ip);
    }

    /// Mac the proxy answers ARP requests for an active service address with:
    /// `02:02` followed by the four octets of the address.
    #[must_use]
    pub fn resolve_service_proxy_mac(&self, ip: IpAddr) -> Option<Mac> {
        let IpAddr::V4(v4) = ip else {
            return None;
        };
        if !self.state.lock().oper.contains_key(&ip) {
            return None;
        }
        let [a, b, c, d] = v4.octets();
        Some(Mac([0x02, 0x02, a, b, c, d]))
    }

    /// Fold a stats reply of the switch into the endpoint statistics.
    /// Replies other than flow stats, and flows of other tables, are ignored.
    pub fn handle_flow_stats_reply(&self, reply: &MultipartReply) {
        let MultipartReply::Flow(flows) = reply else {
            debug!("ignoring non flow stats reply");
            return;
        };
        let mut state = self.state.lock();
        let mut applied = 0usize;
        for flow in flows {
            if flow.table != self.params.dnat_table && flow.table != self.params.snat_table {
                continue;
            }
            if state.stats.apply(flow) {
                applied += 1;
            }
        }
        debug!("applied {applied} of {} flow stats", flows.len());
    }

    /// Statistics of every client endpoint seen in a stats reply.
    #[must_use]
    pub fn endpoint_stats(&self) -> HashMap<IpAddr, EndpointStats> {
        self.state.lock().stats.endpoints().clone()
    }

    /// Note that the switch (re)connected.
    pub fn switch_connected(&self) {
        info!("switch connected");
        self.state.lock().connected = true;
    }

    /// Note that the switch went away. Stats polling stops until restarted.
    pub fn switch_disconnected(&self) {
        info!("switch disconnected, stopping stats polling");
        let mut state = self.state.lock();
        state.connected = false;
        state.poller = None;
    }

    /// Start polling flow stats on `runtime`, unless already polling.
    pub fn start_stats_poll(&self, runtime: &Handle) {
        let mut state = self.state.lock();
        self.start_poller_locked(&mut state, runtime);
    }

    /// Stop polling flow stats. The next handled packet starts it again.
    pub fn stop_stats_poll(&self) {
        if let Some(mut poller) = self.state.lock().poller.take() {
            poller.stop();
        }
    }

    #[must_use]
    pub fn is_polling_stats(&self) -> bool {
        self.state
            .lock()
            .poller
            .as_ref()
            .is_some_and(|p| !p.is_finished())
    }

    pub(crate) fn start_poller_locked(&self, state: &mut ProxyState, runtime: &Handle) {
        if !state.connected {
            debug!("not polling stats: switch disconnected");
            return;
        }
        if state.poller.as_ref().is_some_and(|p| !p.is_finished()) {
            return;
        }
        info!("starting flow stats polling");
        state.poller = Some(StatsPoller::spawn(
            runtime,
            self.switch.clone(),
            [self.params.dnat_table, self.params.snat_table],
            self.params.stats_warmup,
            self.params.stats_interval,
        ));
    }
}
