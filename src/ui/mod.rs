pub mod conversation;
pub mod tui;
