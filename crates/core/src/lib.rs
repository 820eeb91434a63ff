//! Domain logic for frame capture: sampling plans, frame artifacts,
//! entitlements, and the monthly quota ledger.
//!
//! Nothing in this crate spawns processes or touches the network; the
//! only I/O is best-effort persistence of ledger state.

pub mod artifact;
pub mod clock;
pub mod entitlement;
pub mod error;
pub mod ingress;
pub mod plan;
pub mod quota;
pub mod registry;
pub mod source;
pub mod store;
