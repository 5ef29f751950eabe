//! moot API
//!
//! The server's outer surface: the `/ws` signaling endpoint with its
//! per-session read/write loops and message router, plus `/health` and the
//! CORS policy. State lives in `moot-core`; media forwarding in `moot-sfu`.

pub mod http;
pub mod ws;

pub use http::{create_router, AppState};
