//! Score-based proxy rotation
//!
//! The rotator owns the proxy pool and every identity's health score. All
//! mutation goes through `reward`, `penalize`, `add`, `remove`, `clear` and
//! `rotate`; readers only ever get cloned snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::score::HealthScore;
use crate::config::ProxyPoolConfig;
use crate::error::{Result, ScrapeError};
use crate::models::{ProxyEvent, ProxyIdentity};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
struct PoolEntry {
    identity: ProxyIdentity,
    score: HealthScore,
}

#[derive(Debug, Default)]
struct PoolState {
    entries: Vec<Arc<PoolEntry>>,
    /// Always a valid index while `entries` is non-empty
    current: usize,
}

impl PoolState {
    fn find(&self, id: &str) -> Option<&Arc<PoolEntry>> {
        self.entries.iter().find(|e| e.identity.id == id)
    }
}

/// Selects and rotates the active egress identity
pub struct ProxyRotator {
    enabled: bool,
    state: RwLock<PoolState>,
    events: broadcast::Sender<ProxyEvent>,
}

impl ProxyRotator {
    /// Create an empty rotator
    pub fn new(enabled: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            enabled,
            state: RwLock::new(PoolState::default()),
            events,
        }
    }

    /// Create a rotator seeded with the configured providers
    pub fn from_config(config: &ProxyPoolConfig) -> Result<Self> {
        let rotator = Self::new(config.enabled);
        for provider in &config.providers {
            rotator.add(provider.clone())?;
        }
        Ok(rotator)
    }

    /// Register an observer for pool events
    pub fn subscribe(&self) -> broadcast::Receiver<ProxyEvent> {
        self.events.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn count(&self) -> usize {
        self.state.read().entries.len()
    }

    /// The active identity, or `None` for a direct connection
    pub fn current(&self) -> Option<ProxyIdentity> {
        if !self.enabled {
            return None;
        }
        let state = self.state.read();
        state.entries.get(state.current).map(|e| e.identity.clone())
    }

    /// Make the highest scoring identity current
    ///
    /// Ties go to the earliest added identity. An empty pool returns `None`
    /// without emitting an event.
    pub fn rotate(&self) -> Option<ProxyIdentity> {
        let selected = {
            let mut state = self.state.write();
            if state.entries.is_empty() {
                return None;
            }

            let mut best_index = 0;
            let mut best_score = f64::MIN;
            for (index, entry) in state.entries.iter().enumerate() {
                let score = entry.score.get();
                if score > best_score {
                    best_score = score;
                    best_index = index;
                }
            }

            state.current = best_index;
            let entry = &state.entries[best_index];
            info!(
                "Rotated to proxy {} (score {:.3})",
                entry.identity.id, best_score
            );
            entry.identity.clone()
        };

        let selected = self.enabled.then_some(selected);
        self.emit(ProxyEvent::Rotated(selected.clone()));
        selected
    }

    /// Record a successful request through `id`
    pub fn reward(&self, id: &str) {
        let state = self.state.read();
        match state.find(id) {
            Some(entry) => {
                let score = entry.score.reward();
                debug!("Rewarded proxy {} (score {:.3})", id, score);
            }
            None => debug!("Ignoring reward for unknown proxy {}", id),
        }
    }

    /// Record a failed request through `id`
    pub fn penalize(&self, id: &str) {
        let state = self.state.read();
        match state.find(id) {
            Some(entry) => {
                let score = entry.score.penalize();
                debug!("Penalized proxy {} (score {:.3})", id, score);
            }
            None => debug!("Ignoring penalty for unknown proxy {}", id),
        }
    }

    /// Append an identity with the initial score
    pub fn add(&self, identity: ProxyIdentity) -> Result<()> {
        {
            let mut state = self.state.write();
            if state.find(&identity.id).is_some() {
                return Err(ScrapeError::DuplicateProxy { id: identity.id });
            }
            state.entries.push(Arc::new(PoolEntry {
                identity: identity.clone(),
                score: HealthScore::new(),
            }));
        }

        info!("Added proxy {}", identity.id);
        self.emit(ProxyEvent::Added(identity));
        Ok(())
    }

    /// Remove an identity and its score. Unknown ids are a no-op.
    pub fn remove(&self, id: &str) -> Option<ProxyIdentity> {
        let removed = {
            let mut state = self.state.write();
            let position = state.entries.iter().position(|e| e.identity.id == id)?;
            let entry = state.entries.remove(position);
            if position <= state.current {
                state.current = 0;
            }
            entry.identity.clone()
        };

        info!("Removed proxy {}", removed.id);
        self.emit(ProxyEvent::Removed(removed.clone()));
        Some(removed)
    }

    /// Drop every identity. Emits only when the pool was non-empty.
    pub fn clear(&self) {
        let removed = {
            let mut state = self.state.write();
            let removed = state.entries.len();
            state.entries.clear();
            state.current = 0;
            removed
        };

        if removed > 0 {
            info!("Cleared {} proxies", removed);
            self.emit(ProxyEvent::Cleared);
        }
    }

    /// Snapshot of the pool in insertion order
    pub fn list(&self) -> Vec<ProxyIdentity> {
        self.state
            .read()
            .entries
            .iter()
            .map(|e| e.identity.clone())
            .collect()
    }

    /// Snapshot of every identity's score
    pub fn scores(&self) -> HashMap<String, f64> {
        self.state
            .read()
            .entries
            .iter()
            .map(|e| (e.identity.id.clone(), e.score.get()))
            .collect()
    }

    pub fn score(&self, id: &str) -> Option<f64> {
        self.state.read().find(id).map(|e| e.score.get())
    }

    fn emit(&self, event: ProxyEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Default for ProxyRotator {
    fn default() -> Self {
        Self::new(true)
    }
}
