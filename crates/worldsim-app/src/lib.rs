//! Command-line and terminal front ends for the world simulation backend.

pub mod commands;
pub mod terminal;

pub use terminal::Console;
