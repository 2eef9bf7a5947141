//! Two-state bandwidth priority, persisted as a percentage string.

mod store;

pub use store::{ConfigStore, ConfigStoreError, TomlConfigStore};

use std::sync::Mutex;

/// Options key holding the high-priority bandwidth share.
pub const BANDWIDTH_KEY: &str = "high_priority_bandwidth_percent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityState {
    Normal,
    High,
}

impl PriorityState {
    pub fn bandwidth_percent(self) -> u8 {
        match self {
            PriorityState::Normal => 75,
            PriorityState::High => 90,
        }
    }

    pub fn to_persisted(self) -> String {
        self.bandwidth_percent().to_string()
    }

    /// `High` only for exactly `"90"`; anything else, including a missing value, is `Normal`.
    pub fn from_persisted(value: Option<&str>) -> Self {
        match value {
            Some("90") => PriorityState::High,
            _ => PriorityState::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityState::Normal => "normal",
            PriorityState::High => "high",
        }
    }
}

impl std::fmt::Display for PriorityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}%)", self.as_str(), self.bandwidth_percent())
    }
}

/// Reads and writes the priority mode through a `ConfigStore`.
pub struct PriorityController<S: ConfigStore> {
    store: Mutex<S>,
}

impl<S: ConfigStore> PriorityController<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Persist `state`; the store is saved before this returns.
    pub fn set_state(&self, state: PriorityState) -> Result<(), ConfigStoreError> {
        let mut store = self.lock();
        store.set(BANDWIDTH_KEY, &state.to_persisted());
        store.save()?;
        tracing::info!(priority = %state, "priority mode saved");
        Ok(())
    }

    pub fn get_state(&self) -> PriorityState {
        PriorityState::from_persisted(self.lock().get(BANDWIDTH_KEY).as_deref())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
