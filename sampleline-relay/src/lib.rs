//! # sampleline-relay
//!
//! A small HTTP relay that lets the trusted web front end fetch program
//! images from a fixed set of upstream hosts that do not send CORS headers
//! themselves.
//!
//! ```text
//! browser (Origin: trusted) ──GET /?url=<upstream>──► relay
//!                                                       │ policy::decide
//!                                     Origin rewritten  ▼
//!                                                   upstream
//!                                                       │
//! browser ◄── upstream body + Access-Control-Allow-Origin + Vary: Origin
//! ```

#![forbid(unsafe_code)]

mod config;
mod error;
mod origin;
mod policy;
mod server;

pub use config::RelayConfig;
pub use error::RelayError;
pub use origin::normalize_origin;
pub use policy::{decide, RelayDecision, ALLOWED_METHODS, ALLOW_HEADER_VALUE, PREFLIGHT_MAX_AGE};
pub use server::{router, start_server, RelayHandle};
