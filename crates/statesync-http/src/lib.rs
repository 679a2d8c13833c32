//! HTTP transport and command-line plumbing for statesync.

pub mod client;
pub mod hooks;
pub mod local;

pub use client::HttpProjectFileClient;
pub use hooks::LogHooks;
