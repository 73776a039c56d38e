//! Console stand-in for the template's window: parses commands into view events and
//! renders model updates.

pub mod commands;
pub mod view;

pub use commands::ViewError;
pub use view::{ConsoleView, InputOutcome};
