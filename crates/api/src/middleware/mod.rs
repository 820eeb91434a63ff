//! Request extractors shared by handlers.
//!
//! - [`client::ClientContext`] -- Identifies the quota ledger a request is charged to.

pub mod client;
