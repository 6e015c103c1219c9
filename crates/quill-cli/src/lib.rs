//! QuillMusic CLI library.
//!
//! Command implementations and configuration for the `quill` binary,
//! including the optional WebSocket timeline server.

pub mod commands;
pub mod config;
