//! Tracing subscriber bootstrap shared by the workspace binaries.

mod subscriber;

pub use subscriber::{LogFormat, init, init_tracing, init_with};
