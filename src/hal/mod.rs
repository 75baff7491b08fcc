//! Vendor HAL contract.
//!
//! Status codes and callback shapes mirror the native `bt_status_t` /
//! vendor callback table; `VendorHal` and `BluetoothStack` are the seams the
//! bridge core works against, with the raw C ABI confined to [`ffi`] and the
//! process-wide stack lookup in [`stack`].

pub mod ffi;
pub mod stack;

use std::sync::Arc;

pub use ffi::{FfiBluetoothStack, FfiVendorHal, GetProfileInterfaceFn};
pub use stack::RegistryStack;

/// Profile id the vendor sub-interface is registered under in the stack's
/// profile table.
pub const VENDOR_PROFILE_ID: &str = "vendor";

/// Status codes returned by HAL entry points (`bt_status_t`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BtStatus {
    Success = 0,
    Fail,
    NotReady,
    NoMemory,
    Busy,
    Done,
    Unsupported,
    InvalidParam,
    Unhandled,
    AuthFailure,
    RemoteDeviceDown,
    AuthRejected,
    JniEnvironmentError,
    JniThreadAttachError,
    WakeLockError,

    // Any other value from the native side maps here.
    Unknown = 0xff,
}

impl From<u32> for BtStatus {
    fn from(item: u32) -> Self {
        match item {
            0 => BtStatus::Success,
            1 => BtStatus::Fail,
            2 => BtStatus::NotReady,
            3 => BtStatus::NoMemory,
            4 => BtStatus::Busy,
            5 => BtStatus::Done,
            6 => BtStatus::Unsupported,
            7 => BtStatus::InvalidParam,
            8 => BtStatus::Unhandled,
            9 => BtStatus::AuthFailure,
            10 => BtStatus::RemoteDeviceDown,
            11 => BtStatus::AuthRejected,
            12 => BtStatus::JniEnvironmentError,
            13 => BtStatus::JniThreadAttachError,
            14 => BtStatus::WakeLockError,
            _ => BtStatus::Unknown,
        }
    }
}

impl From<BtStatus> for u32 {
    fn from(item: BtStatus) -> Self {
        item as u32
    }
}

impl BtStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, BtStatus::Success)
    }
}

/// Events the vendor HAL reports back, one variant per callback table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorCallbacks {
    /// BR/EDR cleanup finished; the flag is the HAL's success verdict.
    BredrCleanup(bool),
}

/// Owner of the closure HAL events are funneled into.
///
/// The HAL may invoke callbacks from any of its threads, concurrently, so
/// the closure must be `Send + Sync`; dispatch order is whatever the HAL
/// produces.
pub struct VendorCallbacksDispatcher {
    pub dispatch: Box<dyn Fn(VendorCallbacks) + Send + Sync>,
}

/// The vendor profile sub-interface.
///
/// `init` hands the HAL the dispatcher future callbacks flow through;
/// `bredr_cleanup` is fire-and-forget, answered later via
/// [`VendorCallbacks::BredrCleanup`].
pub trait VendorHal: Send + Sync {
    fn init(&self, dispatcher: VendorCallbacksDispatcher) -> BtStatus;
    fn cleanup(&self);
    fn bredr_cleanup(&self);
}

/// The process-wide Bluetooth stack as the bridge sees it.
///
/// `is_loaded` is the per-call "module present" check; `vendor_interface`
/// is the profile-table lookup. Implementations must tolerate both being
/// called at any time, on any thread.
pub trait BluetoothStack: Send + Sync {
    fn is_loaded(&self) -> bool;
    fn vendor_interface(&self, profile_id: &str) -> Option<Arc<dyn VendorHal>>;
}
