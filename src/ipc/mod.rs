//! Socket server that accepts commands from local clients.
//!
//! External tools (keybinding scripts, status-bar widgets) connect to the
//! socket, send one newline-terminated command and read one reply.

pub mod dispatch;
pub mod listener;
