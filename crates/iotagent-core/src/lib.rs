//! # iotagent-core
//!
//! Core library for synchronizing a local registry of IoT devices with a
//! remote context broker.
//!
//! Each device's externally visible attributes (identity, lazily fetched
//! attributes, actively reported attributes) are mirrored as a broker-side
//! context-provider registration, so the broker knows where to fetch or
//! receive values for that device.
//!
//! ## Architecture overview
//!
//! - [`DeviceStore`]: trait for the authoritative local device registry
//! - [`RegistrationTransport`]: trait for delivering registration envelopes
//!   to the broker (HTTP binding lives in `iotagent-broker-http`)
//! - [`TypeConfiguration`]: trait supplying per-type attribute templates
//! - [`RegistrationSynchronizer`]: orchestrates create/update/cancel and
//!   keeps local and remote state consistent
//! - [`protocol`]: pure translation between device records and the wire-level
//!   registration protocol
//! - [`ExpiryPolicy`]: registration validity and re-registration throttling
//!
//! ## Design principles
//!
//! 1. **No global registry**: stores and synchronizers are explicitly
//!    constructed and injectable; multiple independent instances can coexist.
//! 2. **Reactive only**: no background loop; the synchronizer suspends only
//!    while awaiting the transport.
//! 3. **Atomic commits**: the device store is written strictly after a
//!    success outcome from the broker, never on an error path.
//! 4. **Closed error taxonomy**: callers match on [`Error`] variants, never
//!    on strings or status codes.

pub mod config;
pub mod device;
pub mod error;
pub mod policy;
pub mod protocol;
pub mod store;
pub mod sync;
pub mod traits;

mod classify;

// Re-export core types for convenience
pub use config::{AgentConfig, MissingRegistrationPolicy, TypeTemplate};
pub use device::{Attribute, Device, DeviceKey, DeviceRegistration, DeviceUpdate};
pub use error::{Error, Result};
pub use policy::{ExpiryPolicy, IsoDuration};
pub use store::{FileDeviceStore, MemoryDeviceStore};
pub use sync::RegistrationSynchronizer;
pub use traits::{Clock, DeviceStore, RegistrationTransport, SystemClock, TypeConfiguration};
