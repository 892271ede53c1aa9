// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Least-used provider selection.

use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::net::IpAddr;
use tracing::trace;

/// The queue is a max-queue: wrapping in `Reverse` surfaces the provider with
/// the fewest selections first, lowest address on ties.
type Load = Reverse<(u64, IpAddr)>;

/// Picks the provider with the fewest selections.
#[derive(Debug, Default, Clone)]
pub struct Scheduler {
    queue: PriorityQueue<IpAddr, Load>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider with no load. Returns false if it was already known.
    pub fn add_provider(&mut self, provider: IpAddr) -> bool {
        if self.queue.get(&provider).is_some() {
            return false;
        }
        self.queue.push(provider, Reverse((0, provider)));
        true
    }

    /// Forget a provider and its load. Returns false if it was not known.
    pub fn remove_provider(&mut self, provider: IpAddr) -> bool {
        self.queue.remove(&provider).is_some()
    }

    /// Select the least used provider and charge it one selection.
    pub fn select(&mut self) -> Option<IpAddr> {
        let (provider, Reverse((load, _))) = self.queue.peek().map(|(p, l)| (*p, *l))?;
        self.queue
            .change_priority(&provider, Reverse((load + 1, provider)));
        trace!("selected provider {provider} (load {})", load + 1);
        Some(provider)
    }

    /// Give back one selection of `provider`.
    pub fn release(&mut self, provider: IpAddr) {
        if let Some(Reverse((load, _))) = self.queue.get_priority(&provider).copied() {
            self.queue
                .change_priority(&provider, Reverse((load.saturating_sub(1), provider)));
        }
    }

    /// Current load of `provider`.
    #[must_use]
    pub fn load(&self, provider: IpAddr) -> Option<u64> {
        self.queue
            .get_priority(&provider)
            .map(|Reverse((load, _))| *load)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
