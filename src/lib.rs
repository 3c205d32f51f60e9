//! frame-echo: a single-threaded, readiness-driven TCP server.
//!
//! Clients exchange length-prefixed frames (`u32` little-endian length
//! followed by up to 4096 payload bytes). One mio poll loop multiplexes every
//! connection; each connection runs a small read/reply state machine that
//! tolerates fragmented and coalesced frames.
//!
//! Modules:
//! - `codec`: frame encoding and decoding
//! - `runtime`: buffers, connection state machine, connection table, event loop
//! - `protocols`: request handlers invoked per decoded frame
//! - `client`: blocking client for the same protocol
//! - `config`: CLI and TOML configuration

pub mod client;
pub mod codec;
pub mod config;
pub mod protocols;
pub mod runtime;
