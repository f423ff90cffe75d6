//! camrelay: camera selection, capture lifecycle and session-offer relay
//!
//! This crate lets an application pick a video input, keep exactly one
//! capture session open on it, and forward a session offer to a remote
//! endpoint on behalf of a client.
//!
//! # Features
//! - Permission-gated camera enumeration
//! - Single-session capture controller with failure restore
//! - Optional transmit stream derived from the capture session
//! - HTTP relay of `{prompt, offer}` with a normalized failure shape
//!
//! # Usage
//! ```rust,ignore
//! use camrelay::{CaptureController, DeviceRegistry, FakeMediaHost};
//! use std::sync::Arc;
//!
//! let host = Arc::new(FakeMediaHost::new());
//! let registry = DeviceRegistry::new(host.clone());
//! registry.request_capability().await?;
//! let devices = registry.enumerate().await?;
//!
//! let controller = CaptureController::new(host);
//! controller.on_stream_ready(|handle| println!("ready: {}", handle.device_id()));
//! controller.select(&devices[0].id).await?;
//! ```
pub mod capture;
pub mod config;
pub mod errors;
pub mod permissions;
pub mod platform;
pub mod registry;
pub mod relay;
pub mod server;
pub mod types;

// In-memory media host for tests and headless runs
pub mod testing;

pub use capture::{CaptureController, ControllerState, StreamHandle, TrackRole};
pub use config::AppConfig;
pub use errors::{CameraError, ErrorKind, RelayError};
pub use platform::{MediaHost, MediaTrack};
pub use registry::DeviceRegistry;
pub use relay::{NegotiationRelay, OfferRequest, OfferResult};
pub use testing::FakeMediaHost;
pub use types::{CaptureConstraint, Device, DeviceKind, Platform, Resolution, TrackSettings};

#[cfg(feature = "native")]
pub use platform::NativeMediaHost;

/// Detect the current platform using the Platform enum
pub fn current_platform() -> Platform {
    Platform::current()
}

/// Initialize logging with the default filter
pub fn init_logging() {
    init_logging_with("camrelay=info");
}

/// Initialize logging; `RUST_LOG` wins over `default_filter` when set.
pub fn init_logging_with(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        platform: Platform::current(),
        native_host: cfg!(feature = "native"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub platform: Platform,
    /// Built with the nokhwa-backed host
    pub native_host: bool,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "camrelay");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
        assert_eq!(info.platform, current_platform());
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging_with("camrelay=debug");
    }
}
