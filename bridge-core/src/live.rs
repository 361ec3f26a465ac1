// ABOUTME: Shared liveness flag telling adapters whether a competing real-time stream is active
// ABOUTME: Owned by the embedding process; the bridge only reads it

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable flag indicating whether a real-time stream is currently live.
///
/// The owning process updates the flag (e.g., from a deployment marker file);
/// adapters read it when gating inbound messages. Replaces direct filesystem
/// probing inside the bridge.
#[derive(Debug, Clone, Default)]
pub struct LiveStatus {
    live: Arc<AtomicBool>,
}

impl LiveStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Relaxed);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }
}
