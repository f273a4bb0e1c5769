// # Device Store Implementations
//
// Backends for the DeviceStore trait:
// - MemoryDeviceStore: fast, non-persistent; testing and ephemeral deployments
// - FileDeviceStore: JSON file with atomic writes and crash recovery

mod file;
mod memory;

pub use file::FileDeviceStore;
pub use memory::MemoryDeviceStore;
