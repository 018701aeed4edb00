//! Terminal user interface.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background task results
//! - `helpers` - Spawning background tasks
//! - `render` - View dispatch and overlays
//! - `login`, `categories`, `entries`, `detail`, `status`, `help` - widgets

mod categories;
pub mod detail;
mod entries;
mod events;
mod help;
mod helpers;
mod input;
mod login;
mod loop_runner;
mod render;
mod status;

pub use loop_runner::{run, Action};
