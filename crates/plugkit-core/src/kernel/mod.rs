//! # Plugkit Core Kernel
//!
//! The `kernel` module owns the application's startup routine and the
//! shared vocabulary every other module builds on.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Application Bootstrapping**: [`Application`](bootstrap::Application) runs the
//!   startup routine: command line → discovery → resolution → loading.
//! - **Core Constants**: descriptor file name, exported factory symbol and
//!   application identity live in the `constants` submodule.
//! - **Error Handling**: the top-level [`Error`](error::Error) and the `Result`
//!   alias in the `error` submodule.
pub mod bootstrap;
pub mod constants;
pub mod error;

pub use bootstrap::{Application, StartupReport};
pub use error::{Error, KernelLifecyclePhase, Result};
// Test module declaration
#[cfg(test)]
mod tests;
