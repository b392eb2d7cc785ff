//! one place to pick the logging macros so the rest of the crate doesn't care
pub use log::{debug, error, info, trace, warn};
