//! Presentation layer
//!
//! The console front end is a thin view over the supervisor's three
//! operations plus its event channel; it holds no session state of its own.

pub mod console;

pub use console::ConsoleUi;
