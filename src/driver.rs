//! Interrupt wiring between the hardware vectors and the control
//! components. The firmware binary owns the peripherals, builds these
//! monitors at init and forwards each interrupt to the matching `*_isr`
//! entry point; all outward traffic goes through registered callbacks,
//! never direct calls into the planner or protocol layers.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::control::debounce::{DebounceTick, Debouncer};
use crate::control::inputs::{ControlInputs, LimitInputs};
use crate::control::stepper::{timer_schedule, StepperEnergize, TickStrategy};
use crate::settings::DriverCaps;
use crate::signals::{AxesSignals, ControlSignals};
use crate::support::{DebounceTimer, DelayTimer, ParallelInputBus, Prescaler, StepperTimer};

/// Invoked once per stepper-timer tick; the planner pushes the next step
/// into the pulse engine from here.
pub type StepperCallback = fn();
/// Receives confirmed (debounced) logical limit state.
pub type LimitCallback = fn(AxesSignals);
/// Receives the priority-decoded logical control state.
pub type ControlCallback = fn(ControlSignals);
/// Completion callback for a non-blocking millisecond delay.
pub type DelayCallback = fn();

/// Stepper tick source: owns the stepper timer and dispatches the per-tick
/// planner callback.
pub struct StepperTick<T: StepperTimer> {
    timer: T,
    strategy: TickStrategy,
    /// Re-entrancy guard: the real handler re-enables interrupts early to
    /// bound its latency impact, so the vector can fire again while the
    /// callback still runs.
    busy: bool,
    callback: StepperCallback,
}

impl<T: StepperTimer> StepperTick<T> {
    pub fn new(timer: T, callback: StepperCallback) -> Self {
        Self {
            timer,
            strategy: TickStrategy::Amass,
            busy: false,
            callback,
        }
    }

    pub fn apply_caps(&mut self, caps: &DriverCaps) {
        self.strategy = TickStrategy::for_caps(caps);
    }

    /// Energizes the drivers, starts the stepper timer with a long initial
    /// period and fires the callback once to prime the first step.
    pub fn wake_up(&mut self, engine: &mut impl StepperEnergize) {
        engine.energize(AxesSignals::all());
        self.timer.start(0xFFFF, Prescaler::Div1);
        (self.callback)();
    }

    pub fn go_idle(&mut self) {
        self.timer.stop();
    }

    /// Programs the time to the next stepper tick.
    pub fn set_cycles_per_tick(&mut self, cycles: u32) {
        let schedule = timer_schedule(self.strategy, cycles);
        self.timer.start(schedule.count, schedule.prescaler);
    }

    /// Stepper-timer interrupt entry point.
    pub fn timer_isr(&mut self) {
        if !self.busy {
            self.busy = true;
            (self.callback)();
            self.busy = false;
        }
    }
}

/// Limit switch monitor: direct reporting, or settle-and-confirm through
/// the debounce countdown when the capability is enabled.
pub struct LimitMonitor<B, T>
where
    B: ParallelInputBus<Input = u8>,
    T: DebounceTimer,
{
    limits: LimitInputs<B>,
    debouncer: Debouncer,
    timer: T,
    software_debounce: bool,
    callback: LimitCallback,
}

impl<B, T> LimitMonitor<B, T>
where
    B: ParallelInputBus<Input = u8>,
    T: DebounceTimer,
{
    pub fn new(limits: LimitInputs<B>, timer: T, callback: LimitCallback) -> Self {
        Self {
            limits,
            debouncer: Debouncer::new(),
            timer,
            software_debounce: false,
            callback,
        }
    }

    pub fn set_software_debounce(&mut self, enabled: bool) {
        self.software_debounce = enabled;
    }

    pub fn limits(&mut self) -> &mut LimitInputs<B> {
        &mut self.limits
    }

    /// Limit pin edge interrupt. With software debounce the report is
    /// deferred until the input held still for the settle window.
    pub fn edge_isr(&mut self) {
        if self.software_debounce {
            if self.debouncer.arm() {
                self.timer.start();
            }
        } else {
            (self.callback)(self.limits.state());
        }
    }

    /// Debounce-timer interrupt. On expiry the state is re-sampled: the
    /// report reflects the input at confirmation time, not at the original
    /// edge, so a bounce that settled back to rest reports nothing.
    pub fn debounce_isr(&mut self) {
        if let DebounceTick::Expired = self.debouncer.tick() {
            self.timer.stop();
            let state = self.limits.state();
            if state.any() {
                (self.callback)(state);
            }
        }
    }
}

/// Control pin monitor: decodes and reports on every edge.
pub struct ControlMonitor<B: ParallelInputBus<Input = u8>> {
    inputs: ControlInputs<B>,
    callback: ControlCallback,
}

impl<B: ParallelInputBus<Input = u8>> ControlMonitor<B> {
    pub fn new(inputs: ControlInputs<B>, callback: ControlCallback) -> Self {
        Self { inputs, callback }
    }

    pub fn inputs(&mut self) -> &mut ControlInputs<B> {
        &mut self.inputs
    }

    pub fn edge_isr(&mut self) {
        (self.callback)(self.inputs.state());
    }
}

/// Set while a blocking millisecond delay is in flight; cleared by the
/// systick interrupt. Process-wide, like the timer it models.
static DELAY_PENDING: AtomicBool = AtomicBool::new(false);

/// Millisecond delay service: blocking spin, or one-shot completion
/// callback when one is supplied.
pub struct DelayService<T: DelayTimer> {
    timer: T,
    callback: Option<DelayCallback>,
}

impl<T: DelayTimer> DelayService<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            callback: None,
        }
    }

    /// Delays for `ms` milliseconds. With a callback the call returns
    /// immediately and the callback fires from the systick interrupt;
    /// without one the call spins until the timer elapses. `ms == 0`
    /// invokes the callback synchronously.
    pub fn delay_ms(&mut self, ms: u32, callback: Option<DelayCallback>) {
        if ms == 0 {
            if let Some(cb) = callback {
                cb();
            }
            return;
        }

        DELAY_PENDING.store(true, Ordering::Release);
        self.timer.start_ms(ms);

        match callback {
            Some(cb) => self.callback = Some(cb),
            None => while DELAY_PENDING.load(Ordering::Acquire) {},
        }
    }

    pub fn delay_pending(&self) -> bool {
        DELAY_PENDING.load(Ordering::Acquire)
    }

    /// Millisecond-timer interrupt entry point.
    pub fn systick_isr(&mut self) {
        DELAY_PENDING.store(false, Ordering::Release);
        self.timer.stop();
        if let Some(cb) = self.callback.take() {
            cb();
        }
    }
}
