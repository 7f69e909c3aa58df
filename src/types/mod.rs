// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Container/exec IDs and protocol-qualified container ports.

mod id;
mod port;

pub use id::{ContainerId, ExecId};
pub use port::{ContainerPort, PortParseError, Protocol};
