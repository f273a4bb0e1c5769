//! Core traits for the registration engine
//!
//! The synchronizer works against these traits rather than concrete
//! collaborators, so brokers, storage backends, type catalogs, and time can
//! each be swapped or mocked independently.

pub mod clock;
pub mod device_store;
pub mod transport;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use device_store::DeviceStore;
pub use transport::{RawResponse, RegistrationScope, RegistrationTransport, TransportError};
pub use types::{StaticTypeConfiguration, TypeConfiguration, TypeDefaults};
