//! Core traits that decouple brightd from any specific display backend or
//! status bar.
//!
//! The [`CoalescingEngine`](crate::engine::CoalescingEngine) and the socket
//! [`Dispatcher`](crate::ipc::dispatch::Dispatcher) only depend on these
//! abstractions.  Concrete implementations live in [`ddcutil`](crate::ddcutil)
//! and [`waybar`](crate::waybar).

/// Current brightness setting as reported by the display.
///
/// Never cached: every consumer re-queries the adapter so an external change
/// (OSD buttons, another tool) is always picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub current: u32,
    pub max: u32,
}

impl Level {
    pub fn new(current: u32, max: u32) -> Self {
        Self { current, max }
    }
}

/// Abstraction over a display whose brightness can be queried and set.
///
/// Every call may be slow (an implementation might spawn a process and talk
/// DDC/CI over I²C) and individually fallible.  Callers never retry.
///
/// Implementations are shared between the socket handlers and the debounce
/// loop, so they must be [`Send`] + [`Sync`].
pub trait DeviceAdapter: Send + Sync {
    /// The error type produced by this adapter.
    type Error: std::error::Error + Send + 'static;

    /// Return the current level and its maximum.
    fn query(&self) -> Result<Level, Self::Error>;

    /// Apply a new absolute level.
    fn set_level(&self, value: u32) -> Result<(), Self::Error>;

    /// Power the display on (`true`) or put it to sleep (`false`).
    fn set_power(&self, on: bool) -> Result<(), Self::Error>;
}

/// Tells a dependent process (usually a status bar) that the level changed.
///
/// Best-effort: failures are logged by the caller and never retried.
pub trait Notifier: Send + Sync {
    /// The error type produced by this notifier.
    type Error: std::error::Error + Send + 'static;

    fn notify(&self) -> Result<(), Self::Error>;
}
