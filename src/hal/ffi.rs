//! Raw C ABI of the vendor HAL and the safe wrappers over it.
//!
//! Table shapes mirror `hardware/vendor.h`: size-prefixed structs of bare
//! function pointers, `bt_status_t` carried as `u32`. Exactly one vendor
//! interface exists per process, so callback routing goes through a single
//! process-wide dispatcher slot that the owning session installs on init and
//! clears on cleanup.

#![allow(non_camel_case_types)]

use std::cell::UnsafeCell;
use std::ffi::CString;
use std::mem;
use std::os::raw::{c_char, c_void};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::stack;
use super::{BluetoothStack, BtStatus, VendorCallbacks, VendorCallbacksDispatcher, VendorHal};

/// Completion slot for a BR/EDR cleanup request.
pub type BredrCleanupCallback = unsafe extern "C" fn(success: bool);

/// `get_profile_interface` as exposed by the base Bluetooth interface.
pub type GetProfileInterfaceFn =
    unsafe extern "C" fn(profile_id: *const c_char) -> *const c_void;

/// Callback table handed to the HAL's `init`.
#[repr(C)]
pub struct btvendor_callbacks_t {
    pub size: usize,
    pub bredr_cleanup_cb: Option<BredrCleanupCallback>,
}

/// The vendor profile function table.
#[repr(C)]
pub struct btvendor_interface_t {
    pub size: usize,
    pub init: Option<unsafe extern "C" fn(callbacks: *mut btvendor_callbacks_t) -> u32>,
    pub cleanup: Option<unsafe extern "C" fn()>,
    pub bredrcleanup: Option<unsafe extern "C" fn()>,
}

static VENDOR_DISPATCHER: Lazy<Mutex<Option<Arc<VendorCallbacksDispatcher>>>> =
    Lazy::new(|| Mutex::new(None));

fn install_dispatcher(dispatcher: VendorCallbacksDispatcher) {
    *VENDOR_DISPATCHER.lock() = Some(Arc::new(dispatcher));
}

fn clear_dispatcher() {
    *VENDOR_DISPATCHER.lock() = None;
}

/// Hands a HAL event to the installed dispatcher.
///
/// The slot lock is released before the closure runs, so a dispatcher is
/// free to take whatever locks it needs, including re-entering this path
/// from a HAL that completes requests inline.
fn dispatch_vendor_event(event: VendorCallbacks) {
    let dispatcher = VENDOR_DISPATCHER.lock().clone();
    match dispatcher {
        Some(dispatcher) => (dispatcher.dispatch)(event),
        None => log::warn!("No dispatcher installed, dropping HAL event: {:?}", event),
    }
}

/// Trampoline the HAL calls on BR/EDR cleanup completion.
unsafe extern "C" fn bredr_cleanup_cb(success: bool) {
    log::info!("bredr_cleanup_callback");
    dispatch_vendor_event(VendorCallbacks::BredrCleanup(success));
}

// The HAL caches the callbacks pointer it is handed in `init` and may read
// through it at any later point, including after a session this side has
// already dropped. A process-lifetime static is the only storage that can
// honor that, so every init hands out the same table.
struct CallbacksCell(UnsafeCell<btvendor_callbacks_t>);

// The table is never written after construction; the HAL only reads it.
unsafe impl Sync for CallbacksCell {}

static VENDOR_CALLBACKS: CallbacksCell = CallbacksCell(UnsafeCell::new(btvendor_callbacks_t {
    size: mem::size_of::<btvendor_callbacks_t>(),
    bredr_cleanup_cb: Some(bredr_cleanup_cb),
}));

// The table lives in the stack's static memory; sharing the pointer across
// threads is sound.
#[derive(Clone, Copy)]
struct RawInterfaceWrapper {
    raw: *const btvendor_interface_t,
}

unsafe impl Send for RawInterfaceWrapper {}
unsafe impl Sync for RawInterfaceWrapper {}

/// [`VendorHal`] over a raw vendor interface table.
pub struct FfiVendorHal {
    interface: RawInterfaceWrapper,
}

impl FfiVendorHal {
    /// Wraps a vendor interface table obtained from the stack.
    ///
    /// # Safety
    ///
    /// `raw` must point to a vendor interface table that remains valid for
    /// the life of the process. Profile tables handed out by
    /// `get_profile_interface` are statics on the stack side, which
    /// satisfies this.
    pub unsafe fn from_raw(raw: *const btvendor_interface_t) -> Self {
        Self {
            interface: RawInterfaceWrapper { raw },
        }
    }
}

impl VendorHal for FfiVendorHal {
    fn init(&self, dispatcher: VendorCallbacksDispatcher) -> BtStatus {
        let init_fn = match unsafe { (*self.interface.raw).init } {
            Some(f) => f,
            None => {
                log::error!("Vendor interface has no init entry");
                return BtStatus::Unsupported;
            }
        };

        // The HAL may fire callbacks from inside init already.
        install_dispatcher(dispatcher);

        let status = BtStatus::from(unsafe { init_fn(VENDOR_CALLBACKS.0.get()) });
        if !status.is_success() {
            clear_dispatcher();
        }
        status
    }

    fn cleanup(&self) {
        match unsafe { (*self.interface.raw).cleanup } {
            Some(f) => unsafe { f() },
            None => log::error!("Vendor interface has no cleanup entry"),
        }
        clear_dispatcher();
    }

    fn bredr_cleanup(&self) {
        match unsafe { (*self.interface.raw).bredrcleanup } {
            Some(f) => unsafe { f() },
            None => log::error!("Vendor interface has no bredrcleanup entry"),
        }
    }
}

/// [`BluetoothStack`] over the base interface's profile lookup.
pub struct FfiBluetoothStack {
    get_profile_interface: GetProfileInterfaceFn,
}

impl FfiBluetoothStack {
    /// # Safety
    ///
    /// `get_profile_interface` must be the base Bluetooth interface's
    /// profile lookup and must stay callable for the life of the process.
    pub unsafe fn new(get_profile_interface: GetProfileInterfaceFn) -> Self {
        Self {
            get_profile_interface,
        }
    }
}

impl BluetoothStack for FfiBluetoothStack {
    // Being handed the lookup is what "module loaded" means here; the
    // loader uninstalls the registry entry when the module goes away.
    fn is_loaded(&self) -> bool {
        true
    }

    fn vendor_interface(&self, profile_id: &str) -> Option<Arc<dyn VendorHal>> {
        let id = CString::new(profile_id).ok()?;
        let table =
            unsafe { (self.get_profile_interface)(id.as_ptr()) } as *const btvendor_interface_t;
        if table.is_null() {
            return None;
        }
        Some(Arc::new(unsafe { FfiVendorHal::from_raw(table) }))
    }
}

/// Stack-loader entry point: installs (or, with a null argument, removes)
/// the process-wide profile lookup the bridge resolves interfaces through.
///
/// # Safety
///
/// A non-null `get_profile_interface` must be the loaded module's profile
/// lookup and must stay callable until it is unregistered.
#[no_mangle]
pub unsafe extern "C" fn btvendor_register_stack(
    get_profile_interface: Option<GetProfileInterfaceFn>,
) {
    match get_profile_interface {
        Some(lookup) => stack::install(Arc::new(FfiBluetoothStack::new(lookup))),
        None => stack::uninstall(),
    }
}
