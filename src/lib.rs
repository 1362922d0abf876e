//! Real-time motion and I/O core for an embedded CNC controller.
//!
//! Converts planner-supplied step segments into timed step/direction pulses
//! and services the spindle, coolant, limit/control inputs, a probe input
//! and an interrupt-driven serial link. All hardware access goes through
//! capability traits (`embedded-hal` pins, parallel buses, timers) so the
//! core compiles and tests on the host; the firmware binary owns the
//! peripherals and vectors its interrupts into the `*_isr` entry points.
//!
//! Concurrency model: single core, interrupts preempting the foreground.
//! Ring-buffer indices live on atomics with disciplined ownership per
//! context; updates that involve more than one load or store run inside
//! `critical_section` sections.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod control;
pub mod driver;
pub mod serial;
pub mod settings;
pub mod signals;
pub mod support;

pub use driver::{ControlMonitor, DelayService, LimitMonitor, StepperTick};
pub use serial::SerialTransport;
pub use settings::{DriverCaps, Settings};
pub use signals::{AxesSignals, ControlSignals, CoolantState, SpindleState};
