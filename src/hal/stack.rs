//! Process-wide Bluetooth stack registry.
//!
//! The stack loader installs the live stack here; the bridge consults the
//! slot through [`RegistryStack`] on every call, so "module not loaded"
//! stays a per-call condition rather than a snapshot taken at bridge
//! construction.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::{BluetoothStack, VendorHal};

static ACTIVE_STACK: Lazy<RwLock<Option<Arc<dyn BluetoothStack>>>> =
    Lazy::new(|| RwLock::new(None));

/// Installs the live stack, replacing any previous registration.
pub fn install(stack: Arc<dyn BluetoothStack>) {
    log::info!("Bluetooth stack registered");
    *ACTIVE_STACK.write() = Some(stack);
}

/// Removes the registration; subsequent calls see an unloaded module.
pub fn uninstall() {
    log::info!("Bluetooth stack unregistered");
    *ACTIVE_STACK.write() = None;
}

/// Current registration, if any.
pub fn installed() -> Option<Arc<dyn BluetoothStack>> {
    ACTIVE_STACK.read().clone()
}

/// [`BluetoothStack`] view over the registry slot.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegistryStack;

impl RegistryStack {
    pub fn new() -> Self {
        Self
    }
}

impl BluetoothStack for RegistryStack {
    fn is_loaded(&self) -> bool {
        installed().is_some()
    }

    fn vendor_interface(&self, profile_id: &str) -> Option<Arc<dyn VendorHal>> {
        installed()?.vendor_interface(profile_id)
    }
}
