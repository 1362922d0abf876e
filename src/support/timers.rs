//! Timer capability traits. The firmware maps these onto its hardware
//! timers; tests drive them with plain mock structs.

/// Stepper-timer input clock divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    Div1,
    Div8,
    Div64,
}

/// One-shot timer driving the step pulse state machine. Counts in pulse
/// timer ticks ([`crate::config::PULSE_TICKS_PER_US`] per microsecond).
pub trait PulseTimer {
    /// Arm the timer to fire once, `ticks` from now. Re-arming while
    /// running replaces the pending expiry.
    fn arm(&mut self, ticks: u16);
    fn stop(&mut self);
}

/// Periodic timer generating the stepper driver interrupt.
pub trait StepperTimer {
    fn start(&mut self, count: u16, prescaler: Prescaler);
    fn stop(&mut self);
}

/// Fixed-period timer clocking the limit debounce countdown.
pub trait DebounceTimer {
    fn start(&mut self);
    fn stop(&mut self);
}

/// One-shot millisecond timer backing `delay_ms`.
pub trait DelayTimer {
    fn start_ms(&mut self, ms: u32);
    fn stop(&mut self);
}
