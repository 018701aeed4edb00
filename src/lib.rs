//! apunto: a terminal task and notes manager backed by a hosted PostgREST
//! database.
//!
//! The library holds everything but the binary's startup code so that the
//! store, tree and filter logic can be driven from integration tests.

pub mod app;
pub mod cli;
pub mod config;
pub mod editor;
pub mod filter;
pub mod keybindings;
pub mod model;
pub mod remote;
pub mod store;
pub mod theme;
pub mod tree;
pub mod ui;
pub mod util;
