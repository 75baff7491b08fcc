//! Vendor Bluetooth HAL bridge for the Bluetooth application service.
//!
//! The stack layers, top to bottom:
//! - android: JNI entry points registered on the service's Vendor class
//! - bridge: lifecycle core owning the HAL handle and the callback target
//! - hal: the vendor HAL contract (status codes, traits, raw C ABI, stack
//!   registry)
//!
//! The managed runtime drives everything through four native methods
//! (classInitNative, initNative, cleanupNative, bredrcleanupNative); the HAL
//! answers a BR/EDR cleanup request asynchronously with a single boolean
//! callback which the bridge relays back up as `onBredrCleanup(boolean)`.
//! The bridge itself is runtime-agnostic and fully testable off-device.

pub mod error;
pub mod config; // Bridge configuration (profile id, log tag)
pub mod hal; // Vendor HAL contract: status codes, traits, FFI, stack registry
pub mod bridge; // Lifecycle core and callback plumbing

#[cfg(target_os = "android")]
pub mod android; // JNI surface: JNI_OnLoad, native method table, JVM listener

// Re-export commonly used types for easy access
pub use error::{Error, Result};
pub use config::BridgeConfig;
pub use hal::{
    BluetoothStack, BtStatus, VendorCallbacks, VendorCallbacksDispatcher, VendorHal,
    VENDOR_PROFILE_ID,
};
pub use bridge::{
    BridgeState, CleanupWaiter, LoggingListener, VendorBridge, VendorEventListener,
};
