//! HTTP API

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{run, AppContext};
