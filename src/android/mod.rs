//! JNI surface of the vendor bridge.
//!
//! `JNI_OnLoad` registers the four native methods on the service's Vendor
//! class and captures the `JavaVM`; completions travel the other way through
//! [`JavaVendorListener`], which attaches the calling HAL thread and invokes
//! `onBredrCleanup(Z)V` on the pinned callback object. Nothing on this
//! surface throws or panics across the boundary: entry points log and
//! swallow, the listener drops events it cannot deliver.

use std::os::raw::c_void;
use std::sync::Arc;

use jni::objects::{GlobalRef, JClass, JObject, JValue};
use jni::sys::{jboolean, jint, JNI_ERR, JNI_FALSE, JNI_TRUE, JNI_VERSION_1_6};
use jni::{JNIEnv, JavaVM, NativeMethod};
use once_cell::sync::{Lazy, OnceCell};

use crate::bridge::{VendorBridge, VendorEventListener};
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::hal::RegistryStack;

/// Class the native methods are registered on.
const VENDOR_CLASS: &str = "com/android/bluetooth/btservice/Vendor";

static JAVA_VM: OnceCell<Arc<JavaVM>> = OnceCell::new();

static BRIDGE: Lazy<Arc<VendorBridge>> = Lazy::new(|| {
    let config = BridgeConfig::load().unwrap_or_else(|e| {
        log::warn!("Invalid bridge configuration, using defaults: {}", e);
        BridgeConfig::default()
    });
    VendorBridge::new(Arc::new(RegistryStack::new()), config)
});

/// Listener that relays completions onto the pinned service object.
struct JavaVendorListener {
    vm: Arc<JavaVM>,
    target: GlobalRef,
}

impl JavaVendorListener {
    fn relay_bredr_cleanup(&self, success: bool) -> Result<()> {
        let mut env = self.vm.attach_current_thread()?;
        let call = env.call_method(
            self.target.as_obj(),
            "onBredrCleanup",
            "(Z)V",
            &[JValue::Bool(success as u8)],
        );
        if let Err(e) = call {
            // A pending exception must not leak back into the HAL thread.
            if env.exception_check().unwrap_or(false) {
                let _ = env.exception_clear();
            }
            return Err(e.into());
        }
        Ok(())
    }
}

impl VendorEventListener for JavaVendorListener {
    fn on_bredr_cleanup(&self, success: bool) {
        if let Err(e) = self.relay_bredr_cleanup(success) {
            log::error!("Failed to relay BR/EDR cleanup completion: {}", e);
        }
    }
}

/// Registers the fixed native method table on the Vendor class.
pub fn register_vendor_natives(env: &mut JNIEnv) -> Result<()> {
    let class = env.find_class(VENDOR_CLASS)?;
    env.register_native_methods(
        &class,
        &[
            NativeMethod {
                name: "classInitNative".into(),
                sig: "()V".into(),
                fn_ptr: class_init_native as *mut c_void,
            },
            NativeMethod {
                name: "initNative".into(),
                sig: "()V".into(),
                fn_ptr: init_native as *mut c_void,
            },
            NativeMethod {
                name: "cleanupNative".into(),
                sig: "()V".into(),
                fn_ptr: cleanup_native as *mut c_void,
            },
            NativeMethod {
                name: "bredrcleanupNative".into(),
                sig: "()Z".into(),
                fn_ptr: bredr_cleanup_native as *mut c_void,
            },
        ],
    )?;
    log::info!("Registered Bluetooth Vendor native methods");
    Ok(())
}

extern "C" fn class_init_native(mut env: JNIEnv, class: JClass) {
    match env.get_method_id(&class, "onBredrCleanup", "(Z)V") {
        Ok(_) => log::info!("classInitNative: succeeds"),
        Err(e) => {
            log::error!("classInitNative: onBredrCleanup(Z)V not found: {}", e);
            let _ = env.exception_clear();
        }
    }
}

extern "C" fn init_native(mut env: JNIEnv, obj: JObject) {
    let vm = match JAVA_VM.get() {
        Some(vm) => vm.clone(),
        None => {
            log::error!("initNative: JavaVM not captured at load time");
            return;
        }
    };
    let target = match env.new_global_ref(&obj) {
        Ok(target) => target,
        Err(e) => {
            log::error!("initNative: failed to pin callback object: {}", e);
            let _ = env.exception_clear();
            return;
        }
    };

    // Failures are already logged by the bridge; the entry point stays void.
    let _ = BRIDGE.initialize(Arc::new(JavaVendorListener { vm, target }));
}

extern "C" fn cleanup_native(_env: JNIEnv, _obj: JObject) {
    let _ = BRIDGE.cleanup();
}

extern "C" fn bredr_cleanup_native(_env: JNIEnv, _obj: JObject) -> jboolean {
    log::info!("bredrcleanupNative");
    if BRIDGE.bredr_cleanup() {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

/// Library entry point: capture the VM, bring up logging, register natives.
#[no_mangle]
pub extern "C" fn JNI_OnLoad(vm: JavaVM, _reserved: *mut c_void) -> jint {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag(BridgeConfig::load().unwrap_or_default().log_tag),
    );

    let vm = Arc::new(vm);
    if JAVA_VM.set(vm.clone()).is_err() {
        log::warn!("JNI_OnLoad called twice, keeping the first JavaVM");
    }

    let mut env = match vm.get_env() {
        Ok(env) => env,
        Err(e) => {
            log::error!("JNI_OnLoad: no JNIEnv on the loading thread: {}", e);
            return JNI_ERR;
        }
    };

    match register_vendor_natives(&mut env) {
        Ok(()) => JNI_VERSION_1_6,
        Err(e) => {
            log::error!("Failed to register Bluetooth Vendor native methods: {}", e);
            JNI_ERR
        }
    }
}
