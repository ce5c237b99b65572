//! Service layer - protocol orchestration
//!
//! Services coordinate domain logic and port interactions. `Core` is the
//! entry point; the others are building blocks it composes.

pub mod actions;
mod orchestrator;
pub mod encryption;
pub mod logging;

pub use orchestrator::{ConfirmOutcome, Core, Registration};
pub use actions::{ActionFailure, ActionReport, ActionRunner};
pub use encryption::{Cookie, EncryptionService, FILE_FORMAT_VERSION};
