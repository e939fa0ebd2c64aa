//! Ledger of issued identifiers.
//!
//! Backs the `{{uuid}}` directive: every identifier handed out is recorded in
//! durable storage and a fresh one is drawn until it does not collide with
//! anything issued before.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, WeaveError};

use super::Storage;

/// Storage key holding the issued identifiers.
pub const USED_IDS_KEY: &str = "used-uuids";

/// Durable record of issued UUIDs.
pub struct IdLedger {
    storage: Arc<dyn Storage>,
    lock: Mutex<()>,
}

impl IdLedger {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
        }
    }

    /// Issue a new v4 UUID that has never been issued before and record it.
    pub fn issue(&self) -> Result<String> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| WeaveError::Storage(format!("Failed to acquire ledger lock: {}", e)))?;

        let mut issued = self.read()?;
        let mut candidate = Uuid::new_v4().to_string();
        while issued.contains(&candidate) {
            candidate = Uuid::new_v4().to_string();
        }
        issued.push(candidate.clone());
        self.storage.set(USED_IDS_KEY, serde_json::to_value(&issued)?)?;
        Ok(candidate)
    }

    /// Every identifier issued so far, oldest first.
    pub fn issued(&self) -> Result<Vec<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| WeaveError::Storage(format!("Failed to acquire ledger lock: {}", e)))?;
        self.read()
    }

    fn read(&self) -> Result<Vec<String>> {
        match self.storage.get(USED_IDS_KEY)? {
            Some(Value::Array(items)) => Ok(items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()),
            _ => Ok(Vec::new()),
        }
    }
}
