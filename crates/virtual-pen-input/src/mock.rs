//! Mock stylus backend for testing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::InputError;
use crate::{StylusCapabilities, StylusEmulation, StylusReport};

/// Shared state for observing what `MockEmulation` did.
#[derive(Debug, Default)]
struct MockEmulationState {
    created: Vec<StylusCapabilities>,
    batches: Vec<Vec<StylusReport>>,
    open: usize,
    max_concurrent: usize,
    destroyed: usize,
    deny: Option<String>,
}

/// Mock stylus emulation backend for testing.
///
/// Clones share recorded state but each owns its own device, so a factory
/// can hand out one clone per session and tests can still see every session.
pub struct MockEmulation {
    state: Arc<Mutex<MockEmulationState>>,
    device_open: bool,
}

impl Default for MockEmulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockEmulation {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            device_open: false,
        }
    }
}

impl MockEmulation {
    /// Create a new mock emulation backend.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockEmulationState::default())),
            device_open: false,
        }
    }

    /// A backend whose device creation is always denied with `reason`.
    pub fn failing(reason: &str) -> Self {
        let mock = Self::new();
        mock.state.lock().unwrap().deny = Some(reason.to_string());
        mock
    }

    /// Get a clonable handle for observing the emulation state from tests.
    pub fn handle(&self) -> MockEmulationHandle {
        MockEmulationHandle {
            state: Arc::clone(&self.state),
        }
    }
}

/// Clonable observer handle for `MockEmulation`.
#[derive(Clone)]
pub struct MockEmulationHandle {
    state: Arc<Mutex<MockEmulationState>>,
}

impl MockEmulationHandle {
    /// Capabilities of every device created, in order.
    pub fn created(&self) -> Vec<StylusCapabilities> {
        self.state.lock().unwrap().created.clone()
    }

    /// Every emitted batch, in order. Each batch ended with one sync.
    pub fn batches(&self) -> Vec<Vec<StylusReport>> {
        self.state.lock().unwrap().batches.clone()
    }

    /// Devices currently open.
    pub fn open_devices(&self) -> usize {
        self.state.lock().unwrap().open
    }

    /// Highest number of devices open at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.state.lock().unwrap().max_concurrent
    }

    pub fn destroyed(&self) -> usize {
        self.state.lock().unwrap().destroyed
    }
}

#[async_trait]
impl StylusEmulation for MockEmulation {
    async fn create_device(&mut self, caps: &StylusCapabilities) -> Result<(), InputError> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = &state.deny {
            return Err(InputError::VirtualDeviceCreate(reason.clone()));
        }
        if self.device_open {
            return Err(InputError::VirtualDeviceCreate(
                "device already created".to_string(),
            ));
        }
        self.device_open = true;
        state.created.push(caps.clone());
        state.open += 1;
        state.max_concurrent = state.max_concurrent.max(state.open);
        Ok(())
    }

    async fn emit(&mut self, batch: &[StylusReport]) -> Result<(), InputError> {
        if !self.device_open {
            return Err(InputError::Emit("no device".to_string()));
        }
        self.state.lock().unwrap().batches.push(batch.to_vec());
        Ok(())
    }

    async fn destroy_device(&mut self) -> Result<(), InputError> {
        if !self.device_open {
            return Err(InputError::Emit("no device".to_string()));
        }
        self.device_open = false;
        let mut state = self.state.lock().unwrap();
        state.open -= 1;
        state.destroyed += 1;
        Ok(())
    }
}
