//! Frame capture execution: external tools, scratch areas, the remote
//! extraction pipeline, the client frame sampler, and the orchestrator
//! that gates both behind the quota ledger.

pub mod client;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod media;
pub mod orchestrator;
pub mod progress;
pub mod remote;
pub mod scratch;
pub mod subprocess;
pub mod tools;
pub mod ytdlp;
