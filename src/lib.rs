//! **brightd** — a debouncing brightness daemon.
//!
//! Keybinding scripts fire `inc`/`dec` at a Unix socket far faster than a
//! DDC/CI monitor can follow.  brightd answers each request immediately and
//! merges everything that arrives within one debounce window into a single
//! `set` call on the monitor.
//!
//! # Architecture
//!
//! The crate is organised around two core traits:
//!
//! * [`traits::DeviceAdapter`] — abstracts querying and setting the level so
//!   the debounce logic is not coupled to any specific backend.
//! * [`traits::Notifier`] — abstracts telling a status bar that the level
//!   changed.
//!
//! [`engine::CoalescingEngine`] owns the pending step counters and the
//! debounce loop.  [`ipc`] owns the socket and the request protocol.
//! Concrete backends live in [`ddcutil`] and [`waybar`].

pub mod command;
pub mod config;
pub mod ddcutil;
pub mod engine;
pub mod ipc;
pub mod traits;
pub mod waybar;
