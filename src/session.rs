//! Caller-owned cache of finished exchanges.
//!
//! Replaces a process-wide "last result" with an explicit store keyed by
//! exchange id. Results are published as whole `Arc`s under the write lock,
//! so a reader always sees either the previous complete result or the new
//! one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::{debug, info};

use crate::bb84_states::{Exchange, ExchangeId};
use crate::config::{ProtocolConfig, Variant};
use crate::errors::{ProtocolError, Result};
use crate::protocol::{encrypt_with_existing_key, run_exchange, ExchangeResult, ReentryResult};

#[derive(Default)]
struct Entries {
    by_id: HashMap<ExchangeId, Arc<ExchangeResult>>,
    latest: HashMap<Variant, ExchangeId>,
}

#[derive(Default)]
pub struct SessionStore {
    entries: RwLock<Entries>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `result`, replacing any earlier result with the same id, and
    /// marks it as the latest run of its variant.
    pub fn publish(&self, result: ExchangeResult) -> Result<Arc<ExchangeResult>> {
        let result = Arc::new(result);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ProtocolError::SessionPoisoned)?;
        entries.latest.insert(result.variant, result.exchange_id);
        if entries
            .by_id
            .insert(result.exchange_id, Arc::clone(&result))
            .is_some()
        {
            debug!("session: replaced exchange {}", result.exchange_id);
        }
        Ok(result)
    }

    pub fn get(&self, id: ExchangeId) -> Result<Arc<ExchangeResult>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ProtocolError::SessionPoisoned)?;
        entries
            .by_id
            .get(&id)
            .cloned()
            .ok_or(ProtocolError::UnknownExchange(id))
    }

    pub fn latest(&self, variant: Variant) -> Result<Option<Arc<ExchangeResult>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ProtocolError::SessionPoisoned)?;
        Ok(entries
            .latest
            .get(&variant)
            .and_then(|id| entries.by_id.get(id))
            .cloned())
    }

    pub fn remove(&self, id: ExchangeId) -> Result<Option<Arc<ExchangeResult>>> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ProtocolError::SessionPoisoned)?;
        let removed = entries.by_id.remove(&id);
        if let Some(result) = &removed {
            if entries.latest.get(&result.variant) == Some(&id) {
                entries.latest.remove(&result.variant);
            }
        }
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize> {
        self.entries
            .read()
            .map(|e| e.by_id.len())
            .map_err(|_| ProtocolError::SessionPoisoned)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Runs a fresh exchange and publishes the result.
    pub fn run(
        &self,
        exchange: Exchange,
        config: &ProtocolConfig,
        message: Option<&str>,
    ) -> Result<Arc<ExchangeResult>> {
        let result = run_exchange(exchange, config, message)?;
        self.publish(result)
    }

    /// Re-entry path: encrypts with the key material cached for `id`.
    pub fn encrypt_with_existing_key(&self, id: ExchangeId, message: &str) -> Result<ReentryResult> {
        let previous = self.get(id)?;
        info!("session: reusing key material of exchange {}", id);
        encrypt_with_existing_key(&previous, message)
    }
}
