//! Host-OS service tables consumed by the driver and network layers.
//!
//! Every interface the network stack needs from the surrounding kernel —
//! cooperative blocking, IRQ delivery, and user-memory access — crosses
//! through one of these tables. The host installs its implementations
//! during boot; test suites install stubs.

pub mod driver_runtime;
pub mod usermem;
