//! Routes parsed [`Command`]s to the engine or the display.

use crate::command::{percentage, BrightnessReport, Command, Response};
use crate::engine::CoalescingEngine;
use crate::traits::{DeviceAdapter, Notifier};
use log::error;
use std::sync::Arc;

/// Default maximum substituted when the display reports a maximum of zero.
pub const DEFAULT_MAX: u32 = 100;

/// Answers one command.
///
/// `inc`/`dec` only touch the engine's counters and return immediately.
/// `get`/`sleep`/`wakeup` perform a synchronous round trip to the display.
pub struct Dispatcher<D, N> {
    engine: Arc<CoalescingEngine<D, N>>,
    default_max: u32,
}

impl<D, N> Dispatcher<D, N>
where
    D: DeviceAdapter + 'static,
    N: Notifier + 'static,
{
    pub fn new(engine: Arc<CoalescingEngine<D, N>>, default_max: u32) -> Self {
        Self {
            engine,
            default_max,
        }
    }

    pub fn dispatch(&self, cmd: Command) -> Response {
        match cmd {
            Command::Inc => {
                self.engine.record_increment();
                Response::Ok
            }
            Command::Dec => {
                self.engine.record_decrement();
                Response::Ok
            }
            Command::Get => match self.engine.device().query() {
                Ok(level) => Response::Brightness(BrightnessReport {
                    percentage: percentage(level, self.default_max),
                }),
                Err(e) => {
                    error!("failed to query brightness: {}", e);
                    Response::Error
                }
            },
            Command::Sleep => self.set_power(false),
            Command::Wakeup => self.set_power(true),
        }
    }

    fn set_power(&self, on: bool) -> Response {
        match self.engine.device().set_power(on) {
            Ok(()) => Response::Ok,
            Err(e) => {
                error!("failed to power {} display: {}", if on { "on" } else { "off" }, e);
                Response::Error
            }
        }
    }
}
