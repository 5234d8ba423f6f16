//! Terminal review interface: table model, row coloring, theme and the event loop.

pub mod colors;
pub mod components;
pub mod shortcuts;
pub mod table;
pub mod tui;
