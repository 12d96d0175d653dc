//! Native side of the `RNOpenCvLibrary` bridge module.
//!
//! The host runtime calls one of three methods with base64 payloads and a
//! response callback. Work runs on the tokio blocking pool and the callback
//! fires exactly once with an error-first reply.

pub mod error;
pub mod module;
pub mod reply;

pub use error::BridgeError;
pub use module::VisionModule;
pub use reply::{Callback, Reply};
