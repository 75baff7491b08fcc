//! Lifecycle core of the vendor HAL bridge.
//!
//! One `VendorBridge` owns the session state, the HAL handle and the
//! callback target, behind a single lock. Two guards keep HAL completions
//! honest. A session generation stamped into each HAL dispatcher drops
//! events from a torn-down session. On top of that, completions are paired
//! with the outstanding `bredr_cleanup` request: the HAL reports through
//! one process-wide callback slot that a re-`initialize` re-points at the
//! new session, so a completion left in flight across the boundary arrives
//! stamped as current and only the pairing can tell that the new session
//! never asked for it.

pub mod callbacks;

pub use callbacks::{CleanupWaiter, LoggingListener, VendorEventListener};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::hal::{BluetoothStack, VendorCallbacks, VendorCallbacksDispatcher, VendorHal};

/// Coarse lifecycle state, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Active,
}

#[derive(Default)]
struct BridgeInner {
    hal: Option<Arc<dyn VendorHal>>,
    listener: Option<Arc<dyn VendorEventListener>>,
    // Set by `bredr_cleanup`, consumed by the matching completion. The HAL
    // carries no request token, so this is what ties the two together.
    bredr_pending: bool,
}

/// Bridge between the managed Bluetooth service and the vendor HAL.
pub struct VendorBridge {
    stack: Arc<dyn BluetoothStack>,
    config: BridgeConfig,
    inner: Mutex<BridgeInner>,
    // Bumped at every session boundary; dispatchers carry the value current
    // at their init and their events are dropped once it moves on.
    generation: AtomicU64,
    self_ref: Weak<VendorBridge>,
}

impl VendorBridge {
    pub fn new(stack: Arc<dyn BluetoothStack>, config: BridgeConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            stack,
            config,
            inner: Mutex::new(BridgeInner::default()),
            generation: AtomicU64::new(0),
            self_ref: self_ref.clone(),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Initializes the vendor HAL and retains `listener` for its callbacks.
    ///
    /// Runs the fixed sequence: stack liveness check (failure leaves any
    /// previous session untouched), release of a previous callback target,
    /// vendor interface lookup, HAL init. Failures after the liveness check
    /// leave the bridge uninitialized. The previous interface is discarded
    /// without a HAL cleanup call, as the shipped service always did on
    /// re-init.
    pub fn initialize(&self, listener: Arc<dyn VendorEventListener>) -> Result<()> {
        if !self.stack.is_loaded() {
            log::error!("Bluetooth module is not loaded");
            return Err(Error::StackNotLoaded);
        }

        {
            let mut inner = self.inner.lock();
            if inner.listener.take().is_some() {
                log::warn!("Cleaning up Bluetooth Vendor callback object");
            }
            inner.hal = None;
            // Requests from the previous session die with it.
            inner.bredr_pending = false;
        }

        let hal = match self.stack.vendor_interface(&self.config.profile_id) {
            Some(hal) => hal,
            None => {
                log::error!("Failed to get Bluetooth Vendor Interface");
                return Err(Error::VendorInterfaceUnavailable(
                    self.config.profile_id.clone(),
                ));
            }
        };

        // New session: events stamped with an older generation are stale.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let bridge = self.self_ref.clone();
        let dispatcher = VendorCallbacksDispatcher {
            dispatch: Box::new(move |event| {
                if let Some(bridge) = bridge.upgrade() {
                    bridge.dispatch_hal_event(generation, event);
                }
            }),
        };

        let status = hal.init(dispatcher);
        if !status.is_success() {
            log::error!("Failed to initialize Bluetooth Vendor, status: {:?}", status);
            return Err(Error::HalInit(status));
        }

        let mut inner = self.inner.lock();
        inner.hal = Some(hal);
        inner.listener = Some(listener);
        Ok(())
    }

    /// Tears the session down: HAL cleanup, then callback target release.
    ///
    /// With no session active this is a silent no-op. A missing stack aborts
    /// before any state change, leaving the references in place exactly as
    /// the shipped service did.
    pub fn cleanup(&self) -> Result<()> {
        if !self.stack.is_loaded() {
            log::error!("Bluetooth module is not loaded");
            return Err(Error::StackNotLoaded);
        }

        let (hal, listener) = {
            let mut inner = self.inner.lock();
            inner.bredr_pending = false;
            (inner.hal.take(), inner.listener.take())
        };
        // Stamp anything still in flight as stale before the HAL teardown
        // runs, so completions racing it cannot land on the old listener.
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(hal) = hal {
            log::warn!("Cleaning up Bluetooth Vendor Interface...");
            hal.cleanup();
        }
        if listener.is_some() {
            log::warn!("Cleaning up Bluetooth Vendor callback object");
        }
        Ok(())
    }

    /// Submits a BR/EDR cleanup request.
    ///
    /// Returns whether the request was handed to the HAL ("accepted"), not
    /// whether cleanup finished; completion arrives later via the listener
    /// and answers the request marked outstanding here. Uninitialized, this
    /// is a `false` no-op.
    pub fn bredr_cleanup(&self) -> bool {
        let hal = {
            let mut inner = self.inner.lock();
            match inner.hal.clone() {
                Some(hal) => {
                    inner.bredr_pending = true;
                    hal
                }
                None => return false,
            }
        };
        // Outside the lock: the HAL may complete inline on this thread.
        hal.bredr_cleanup();
        true
    }

    pub fn state(&self) -> BridgeState {
        if self.inner.lock().hal.is_some() {
            BridgeState::Active
        } else {
            BridgeState::Uninitialized
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == BridgeState::Active
    }

    /// Relay point for HAL events, called from the session dispatcher.
    ///
    /// A completion is delivered only if its generation is current and this
    /// session has a request outstanding; the delivery consumes the request.
    /// The listener runs outside the bridge lock.
    fn dispatch_hal_event(&self, generation: u64, event: VendorCallbacks) {
        if generation != self.generation.load(Ordering::SeqCst) {
            log::warn!("Dropping stale vendor HAL event: {:?}", event);
            return;
        }
        match event {
            VendorCallbacks::BredrCleanup(success) => {
                let listener = {
                    let mut inner = self.inner.lock();
                    if !inner.bredr_pending {
                        log::warn!(
                            "Dropping BR/EDR cleanup completion with no request outstanding"
                        );
                        return;
                    }
                    inner.bredr_pending = false;
                    inner.listener.clone()
                };
                match listener {
                    Some(listener) => listener.on_bredr_cleanup(success),
                    None => log::warn!(
                        "No callback object registered, dropping BR/EDR cleanup completion"
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::BtStatus;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockHal {
        init_status: BtStatus,
        dispatcher: Mutex<Option<VendorCallbacksDispatcher>>,
        init_calls: AtomicUsize,
        cleanup_calls: AtomicUsize,
        bredr_calls: AtomicUsize,
    }

    impl MockHal {
        fn new(init_status: BtStatus) -> Arc<Self> {
            Arc::new(Self {
                init_status,
                dispatcher: Mutex::new(None),
                init_calls: AtomicUsize::new(0),
                cleanup_calls: AtomicUsize::new(0),
                bredr_calls: AtomicUsize::new(0),
            })
        }

        /// Simulates the HAL completing a BR/EDR cleanup.
        fn fire_bredr_cleanup(&self, success: bool) {
            let dispatcher = self.dispatcher.lock();
            if let Some(dispatcher) = dispatcher.as_ref() {
                (dispatcher.dispatch)(VendorCallbacks::BredrCleanup(success));
            }
        }
    }

    impl VendorHal for MockHal {
        fn init(&self, dispatcher: VendorCallbacksDispatcher) -> BtStatus {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            if self.init_status.is_success() {
                *self.dispatcher.lock() = Some(dispatcher);
            }
            self.init_status
        }

        fn cleanup(&self) {
            self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
        }

        fn bredr_cleanup(&self) {
            self.bredr_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockStack {
        loaded: AtomicBool,
        hal: Mutex<Option<Arc<MockHal>>>,
    }

    impl MockStack {
        fn with_hal(hal: Arc<MockHal>) -> Arc<Self> {
            Arc::new(Self {
                loaded: AtomicBool::new(true),
                hal: Mutex::new(Some(hal)),
            })
        }

        fn without_vendor_interface() -> Arc<Self> {
            Arc::new(Self {
                loaded: AtomicBool::new(true),
                hal: Mutex::new(None),
            })
        }

        fn set_loaded(&self, loaded: bool) {
            self.loaded.store(loaded, Ordering::SeqCst);
        }

        fn set_hal(&self, hal: Option<Arc<MockHal>>) {
            *self.hal.lock() = hal;
        }
    }

    impl BluetoothStack for MockStack {
        fn is_loaded(&self) -> bool {
            self.loaded.load(Ordering::SeqCst)
        }

        fn vendor_interface(&self, profile_id: &str) -> Option<Arc<dyn VendorHal>> {
            if profile_id != crate::hal::VENDOR_PROFILE_ID {
                return None;
            }
            self.hal
                .lock()
                .clone()
                .map(|hal| hal as Arc<dyn VendorHal>)
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        completions: Mutex<Vec<bool>>,
    }

    impl VendorEventListener for RecordingListener {
        fn on_bredr_cleanup(&self, success: bool) {
            self.completions.lock().push(success);
        }
    }

    fn bridge_with(stack: Arc<MockStack>) -> Arc<VendorBridge> {
        VendorBridge::new(stack, BridgeConfig::default())
    }

    #[test]
    fn test_initialize_requires_loaded_stack() {
        let hal = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(hal.clone());
        stack.set_loaded(false);
        let bridge = bridge_with(stack);

        let err = bridge
            .initialize(Arc::new(RecordingListener::default()))
            .unwrap_err();
        assert!(matches!(err, Error::StackNotLoaded));
        assert_eq!(bridge.state(), BridgeState::Uninitialized);
        assert_eq!(hal.init_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unloaded_stack_leaves_previous_session_untouched() {
        let hal = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(hal.clone());
        let bridge = bridge_with(stack.clone());

        bridge
            .initialize(Arc::new(RecordingListener::default()))
            .unwrap();
        assert!(bridge.is_active());

        stack.set_loaded(false);
        let err = bridge
            .initialize(Arc::new(RecordingListener::default()))
            .unwrap_err();
        assert!(err.preserves_state());
        assert!(bridge.is_active());
        assert!(bridge.bredr_cleanup());
    }

    #[test]
    fn test_initialize_without_vendor_interface() {
        let stack = MockStack::without_vendor_interface();
        let bridge = bridge_with(stack);

        let err = bridge
            .initialize(Arc::new(RecordingListener::default()))
            .unwrap_err();
        assert!(matches!(err, Error::VendorInterfaceUnavailable(_)));
        assert_eq!(bridge.state(), BridgeState::Uninitialized);
        assert!(!bridge.bredr_cleanup());
    }

    #[test]
    fn test_initialize_hal_failure_clears_previous_session() {
        let good = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(good.clone());
        let bridge = bridge_with(stack.clone());

        let first = Arc::new(RecordingListener::default());
        bridge.initialize(first.clone()).unwrap();
        assert!(bridge.is_active());

        // Second init hits a HAL that rejects, taking the session down.
        let bad = MockHal::new(BtStatus::NotReady);
        stack.set_hal(Some(bad));
        let err = bridge
            .initialize(Arc::new(RecordingListener::default()))
            .unwrap_err();
        assert!(matches!(err, Error::HalInit(BtStatus::NotReady)));
        assert_eq!(bridge.state(), BridgeState::Uninitialized);

        // A completion from the dead first session goes nowhere.
        good.fire_bredr_cleanup(true);
        assert!(first.completions.lock().is_empty());
    }

    #[test]
    fn test_bredr_cleanup_before_initialize() {
        let hal = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(hal.clone());
        let bridge = bridge_with(stack);

        assert!(!bridge.bredr_cleanup());
        assert_eq!(hal.bredr_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bredr_cleanup_submits_exactly_once() {
        let hal = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(hal.clone());
        let bridge = bridge_with(stack);

        bridge
            .initialize(Arc::new(RecordingListener::default()))
            .unwrap();
        assert!(bridge.bredr_cleanup());
        assert_eq!(hal.bredr_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_completion_relayed_to_listener() {
        let hal = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(hal.clone());
        let bridge = bridge_with(stack);

        let listener = Arc::new(RecordingListener::default());
        bridge.initialize(listener.clone()).unwrap();

        // Each request is answered by exactly one completion, verdicts
        // passed through unchanged.
        assert!(bridge.bredr_cleanup());
        hal.fire_bredr_cleanup(true);
        assert!(bridge.bredr_cleanup());
        hal.fire_bredr_cleanup(false);
        assert_eq!(listener.completions.lock().as_slice(), &[true, false]);
    }

    #[test]
    fn test_unsolicited_completion_dropped() {
        let hal = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(hal.clone());
        let bridge = bridge_with(stack);

        let listener = Arc::new(RecordingListener::default());
        bridge.initialize(listener.clone()).unwrap();

        // No request outstanding: the completion goes nowhere.
        hal.fire_bredr_cleanup(true);
        assert!(listener.completions.lock().is_empty());

        // One request pairs with one completion; the repeat is dropped.
        assert!(bridge.bredr_cleanup());
        hal.fire_bredr_cleanup(false);
        hal.fire_bredr_cleanup(true);
        assert_eq!(listener.completions.lock().as_slice(), &[false]);
    }

    #[test]
    fn test_completion_after_cleanup_is_dropped() {
        let hal = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(hal.clone());
        let bridge = bridge_with(stack);

        let listener = Arc::new(RecordingListener::default());
        bridge.initialize(listener.clone()).unwrap();
        assert!(bridge.bredr_cleanup());
        bridge.cleanup().unwrap();

        hal.fire_bredr_cleanup(true);
        assert!(listener.completions.lock().is_empty());
    }

    #[test]
    fn test_reinitialize_swaps_listener() {
        let hal = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(hal.clone());
        let bridge = bridge_with(stack);

        let first = Arc::new(RecordingListener::default());
        let second = Arc::new(RecordingListener::default());
        bridge.initialize(first.clone()).unwrap();
        bridge.initialize(second.clone()).unwrap();

        // Re-init swaps the target without a HAL cleanup call.
        assert_eq!(hal.cleanup_calls.load(Ordering::SeqCst), 0);
        assert_eq!(hal.init_calls.load(Ordering::SeqCst), 2);

        assert!(bridge.bredr_cleanup());
        hal.fire_bredr_cleanup(true);
        assert!(first.completions.lock().is_empty());
        assert_eq!(second.completions.lock().as_slice(), &[true]);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let hal = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(hal.clone());
        let bridge = bridge_with(stack);

        bridge
            .initialize(Arc::new(RecordingListener::default()))
            .unwrap();
        bridge.cleanup().unwrap();
        assert_eq!(hal.cleanup_calls.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.state(), BridgeState::Uninitialized);

        // Second cleanup finds nothing to release and stays quiet.
        bridge.cleanup().unwrap();
        assert_eq!(hal.cleanup_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cleanup_requires_loaded_stack() {
        let hal = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(hal.clone());
        let bridge = bridge_with(stack.clone());

        bridge
            .initialize(Arc::new(RecordingListener::default()))
            .unwrap();
        stack.set_loaded(false);

        let err = bridge.cleanup().unwrap_err();
        assert!(matches!(err, Error::StackNotLoaded));
        // References stay in place; the HAL saw no cleanup.
        assert!(bridge.is_active());
        assert_eq!(hal.cleanup_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stale_generation_event_dropped_after_reinit() {
        let first_hal = MockHal::new(BtStatus::Success);
        let stack = MockStack::with_hal(first_hal.clone());
        let bridge = bridge_with(stack.clone());

        let first = Arc::new(RecordingListener::default());
        bridge.initialize(first.clone()).unwrap();

        let second_hal = MockHal::new(BtStatus::Success);
        stack.set_hal(Some(second_hal.clone()));
        let second = Arc::new(RecordingListener::default());
        bridge.initialize(second.clone()).unwrap();
        assert!(bridge.bredr_cleanup());

        // The first session's dispatcher is still wired into first_hal; its
        // events must not reach the new listener, and being dropped as stale
        // must not consume the new session's outstanding request.
        first_hal.fire_bredr_cleanup(true);
        assert!(first.completions.lock().is_empty());
        assert!(second.completions.lock().is_empty());

        second_hal.fire_bredr_cleanup(true);
        assert_eq!(second.completions.lock().as_slice(), &[true]);
    }
}
