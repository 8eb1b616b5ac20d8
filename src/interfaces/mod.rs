//! Outer surfaces: the HTTP API and the startup seed file.

pub mod http;
pub mod seed;
