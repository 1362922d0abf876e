//! Limit, control and probe input samplers: read raw levels, mask to the
//! relevant bits and XOR against the configured invert mask to produce
//! logical triggered/not-triggered state.

use core::convert::Infallible;

use embedded_hal::digital::v2::InputPin;

use crate::signals::{AxesSignals, ControlSignals};
use crate::support::ParallelInputBus;

/// Limit switch sampler. Bus bit 0 is the X limit, bit 1 Y, bit 2 Z.
pub struct LimitInputs<B: ParallelInputBus<Input = u8>> {
    bus: B,
    invert: AxesSignals,
}

impl<B: ParallelInputBus<Input = u8>> LimitInputs<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            invert: AxesSignals::empty(),
        }
    }

    pub fn set_invert(&mut self, invert: AxesSignals) {
        self.invert = invert;
    }

    /// Logical limit state, triggered = 1.
    pub fn state(&self) -> AxesSignals {
        AxesSignals::new(self.bus.get()).invert(self.invert)
    }
}

/// Control signal sampler. Bus bit 0 is reset, bit 1 feed hold, bit 2 cycle
/// start, bit 3 safety door.
pub struct ControlInputs<B: ParallelInputBus<Input = u8>> {
    bus: B,
    invert: ControlSignals,
}

impl<B: ParallelInputBus<Input = u8>> ControlInputs<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            invert: ControlSignals::empty(),
        }
    }

    pub fn set_invert(&mut self, invert: ControlSignals) {
        self.invert = invert;
    }

    /// Logical control state. When several lines read asserted at once only
    /// the highest-priority one is reported:
    /// reset > safety door > feed hold > cycle start.
    pub fn state(&self) -> ControlSignals {
        let raw = self.bus.get();

        let decoded = if raw & ControlSignals::RESET != 0 {
            ControlSignals::RESET
        } else if raw & ControlSignals::SAFETY_DOOR != 0 {
            ControlSignals::SAFETY_DOOR
        } else if raw & ControlSignals::FEED_HOLD != 0 {
            ControlSignals::FEED_HOLD
        } else if raw & ControlSignals::CYCLE_START != 0 {
            ControlSignals::CYCLE_START
        } else {
            0
        };

        ControlSignals::new(decoded).invert(self.invert)
    }
}

/// Probe input with normal-high/normal-low and probing-direction handling.
pub struct Probe<P: InputPin<Error = Infallible>> {
    pin: P,
    invert: bool,
}

impl<P: InputPin<Error = Infallible>> Probe<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, invert: true }
    }

    /// Rebuilds the invert from the normal-state setting and the probing
    /// cycle direction (toward or away from the workpiece).
    pub fn configure(&mut self, invert_probe_pin: bool, is_probe_away: bool) {
        self.invert = !invert_probe_pin;
        if is_probe_away {
            self.invert = !self.invert;
        }
    }

    /// Probe contact state, triggered = `true`.
    pub fn triggered(&self) -> bool {
        let raw = matches!(self.pin.is_high(), Ok(true));
        raw ^ self.invert
    }
}
