//! Errors surfaced across the module boundary.
//!
//! Structural failures (malformed PE, directory maps out of range, ...) are
//! never errors: they're recovered locally by returning "absent" or
//! "undefined" (see [`crate::sink::UNDEFINED`]). The only real error channel
//! is resource exhaustion while attaching a binding at module-load time.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("insufficient memory to bind PE module")]
    InsufficientMemory,
}
