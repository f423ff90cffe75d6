//! Testing utilities for camrelay
//!
//! Provides an in-memory [`MediaHost`](crate::platform::MediaHost) so the
//! registry and controller can be exercised without camera hardware.

pub mod fake_host;

pub use fake_host::{FakeMediaHost, HostEvent};
