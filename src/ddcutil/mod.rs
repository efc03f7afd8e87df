//! ddcutil-specific implementations.
//!
//! This module provides the concrete [`DeviceAdapter`](crate::traits::DeviceAdapter)
//! backend, which drives an external monitor over DDC/CI by spawning the
//! `ddcutil` command-line tool.
//!
//! Nothing outside this module should reference ddcutil directly.

pub mod display;
