//! Error types for the vendor HAL bridge.
//!
//! The managed-runtime boundary never surfaces these (entry points stay
//! void/boolean and log instead); they exist for the layers underneath and
//! for tests.

use thiserror::Error;

use crate::hal::BtStatus;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Vendor bridge error types
#[derive(Debug, Error)]
pub enum Error {
    /// The base Bluetooth interface is not available in this process.
    #[error("Bluetooth module is not loaded")]
    StackNotLoaded,

    /// The stack is up but did not hand out the vendor sub-interface.
    #[error("Failed to get Bluetooth Vendor Interface (profile '{0}')")]
    VendorInterfaceUnavailable(String),

    /// The vendor sub-interface rejected initialization.
    #[error("Failed to initialize Bluetooth Vendor, status: {0:?}")]
    HalInit(BtStatus),

    #[error("Configuration error: {0}")]
    Config(String),

    /// JNI environment or call failure on the managed-runtime side.
    #[error("JNI error: {0}")]
    Jni(String),
}

impl Error {
    /// Whether the failure left the bridge state exactly as it was.
    ///
    /// Only the missing-stack early return has that property; every other
    /// initialization failure clears the session first.
    pub fn preserves_state(&self) -> bool {
        matches!(self, Error::StackNotLoaded)
    }
}

#[cfg(target_os = "android")]
impl From<jni::errors::Error> for Error {
    fn from(err: jni::errors::Error) -> Self {
        Error::Jni(err.to_string())
    }
}
