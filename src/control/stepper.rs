//! Stepper pulse engine: a timer-driven state machine that asserts
//! direction, asserts step outputs and times the de-assertion, with an
//! optional configured delay between direction and step.
//!
//! Outputs are XORed against per-engine invert masks on the way to the bus,
//! so "step asserted" stays a logical notion independent of electrical
//! polarity.

use crate::config::PULSE_TICKS_PER_US;
use crate::settings::{DriverCaps, Settings};
use crate::signals::AxesSignals;
use crate::support::{ParallelOutputBus, Prescaler, PulseTimer};

use super::spindle::SpindleSpeed;

/// One planner-produced step: which step/direction bits to drive and the
/// spindle duty that should be in effect while it executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepSegment {
    pub step_bits: u8,
    pub dir_bits: u8,
    pub spindle_duty: u16,
}

/// Pulse generation mode, selected once at settings-apply time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PulseMode {
    /// Step outputs written in `pulse_start` itself.
    Immediate,
    /// Step assertion deferred by `delay_ticks` after the direction write.
    Delayed { delay_ticks: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PulseState {
    Idle,
    WaitDelay,
    Pulsing,
}

/// Stepper-timer scheduling strategy. With AMASS the planner pre-scales
/// cycle counts itself; without it the timer divisor absorbs the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickStrategy {
    Amass,
    Prescaled,
}

impl TickStrategy {
    pub fn for_caps(caps: &DriverCaps) -> Self {
        if caps.amass_level == 0 {
            TickStrategy::Prescaled
        } else {
            TickStrategy::Amass
        }
    }
}

/// Divisor and count to program into the stepper timer for one tick period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerSchedule {
    pub prescaler: Prescaler,
    pub count: u16,
}

/// Maps a cycles-per-tick request onto timer divisor and count. Out-of-range
/// requests saturate at the slowest representable rate.
pub fn timer_schedule(strategy: TickStrategy, cycles_per_tick: u32) -> TimerSchedule {
    match strategy {
        TickStrategy::Amass => TimerSchedule {
            prescaler: Prescaler::Div1,
            count: cycles_per_tick.min(0xFFFF) as u16,
        },
        TickStrategy::Prescaled => {
            if cycles_per_tick < (1 << 16) {
                TimerSchedule {
                    prescaler: Prescaler::Div1,
                    count: cycles_per_tick as u16,
                }
            } else if cycles_per_tick < (1 << 19) {
                TimerSchedule {
                    prescaler: Prescaler::Div8,
                    count: (cycles_per_tick >> 3) as u16,
                }
            } else {
                TimerSchedule {
                    prescaler: Prescaler::Div64,
                    count: (cycles_per_tick >> 6).min(0xFFFF) as u16,
                }
            }
        }
    }
}

/// The pulse engine proper. `SB`/`DB`/`EB` drive the step, direction and
/// driver-enable outputs; `T` is the one-shot pulse timer.
pub struct StepperDriver<SB, DB, EB, T>
where
    SB: ParallelOutputBus<Output = u8>,
    DB: ParallelOutputBus<Output = u8>,
    EB: ParallelOutputBus<Output = u8>,
    T: PulseTimer,
{
    step_bus: SB,
    dir_bus: DB,
    enable_bus: EB,
    timer: T,

    step_invert: AxesSignals,
    dir_invert: AxesSignals,
    enable_invert: AxesSignals,

    mode: PulseMode,
    /// Pulse width in pulse-timer ticks.
    pulse_ticks: u16,

    state: PulseState,
    /// Step bits stashed between `pulse_start` and the delay expiry.
    next_step_bits: u8,
    /// Last duty handed to the spindle; duty writes are skipped while the
    /// commanded value matches.
    last_duty: u16,
}

impl<SB, DB, EB, T> StepperDriver<SB, DB, EB, T>
where
    SB: ParallelOutputBus<Output = u8>,
    DB: ParallelOutputBus<Output = u8>,
    EB: ParallelOutputBus<Output = u8>,
    T: PulseTimer,
{
    pub fn new(step_bus: SB, dir_bus: DB, enable_bus: EB, timer: T) -> Self {
        Self {
            step_bus,
            dir_bus,
            enable_bus,
            timer,

            step_invert: AxesSignals::empty(),
            dir_invert: AxesSignals::empty(),
            enable_invert: AxesSignals::empty(),

            mode: PulseMode::Immediate,
            pulse_ticks: 0,

            state: PulseState::Idle,
            next_step_bits: 0,
            last_duty: 0,
        }
    }

    /// Applies invert masks and pulse timing; picks the pulse mode. Axes
    /// flagged for de-energize are released here.
    pub fn apply_settings(&mut self, settings: &Settings, caps: &DriverCaps) {
        self.step_invert = settings.step_invert;
        self.dir_invert = settings.dir_invert;
        self.enable_invert = settings.stepper_enable_invert;
        self.enable(settings.stepper_deenergize);

        self.pulse_ticks = (settings.pulse_microseconds * PULSE_TICKS_PER_US).saturating_sub(1);
        self.mode = if caps.step_pulse_delay && settings.pulse_delay_microseconds > 0 {
            PulseMode::Delayed {
                delay_ticks: settings.pulse_delay_microseconds * PULSE_TICKS_PER_US,
            }
        } else {
            PulseMode::Immediate
        };
        trace!("pulse mode: {}, width {} ticks", self.mode, self.pulse_ticks);
    }

    fn set_step_outputs(&mut self, bits: u8) {
        self.step_bus
            .set(AxesSignals::new(bits).invert(self.step_invert).bits());
    }

    fn set_dir_outputs(&mut self, bits: u8) {
        self.dir_bus
            .set(AxesSignals::new(bits).invert(self.dir_invert).bits());
    }

    /// Energizes/de-energizes stepper drivers.
    pub fn enable(&mut self, axes: AxesSignals) {
        self.enable_bus.set(axes.invert(self.enable_invert).bits());
    }

    /// Writes the idle direction pattern, used at startup.
    pub fn reset_outputs(&mut self) {
        self.set_dir_outputs(0);
        self.set_step_outputs(0);
    }

    /// Materializes one step: refreshes the spindle duty when it changed,
    /// drives direction, then asserts (or schedules) the step outputs and
    /// arms the de-assert timer. Called from the stepper-timer interrupt.
    pub fn pulse_start<S: SpindleSpeed>(&mut self, segment: &StepSegment, spindle: &mut S) {
        if segment.spindle_duty != self.last_duty {
            self.last_duty = spindle.set_speed(segment.spindle_duty);
        }

        self.set_dir_outputs(segment.dir_bits);

        match self.mode {
            PulseMode::Immediate => {
                self.set_step_outputs(segment.step_bits);
                self.timer.arm(self.pulse_ticks);
                self.state = PulseState::Pulsing;
            }
            PulseMode::Delayed { delay_ticks } => {
                self.next_step_bits = segment.step_bits;
                self.timer.arm(delay_ticks);
                self.state = PulseState::WaitDelay;
            }
        }
    }

    /// Delay-expiry interrupt (delayed mode): asserts the stashed step
    /// outputs and re-arms the timer relative to now, so the pulse width
    /// does not depend on interrupt latency.
    pub fn pulse_delay_isr(&mut self) {
        if self.state == PulseState::WaitDelay {
            self.set_step_outputs(self.next_step_bits);
            self.timer.arm(self.pulse_ticks);
            self.state = PulseState::Pulsing;
        }
    }

    /// Width-expiry interrupt: restores the idle step pattern.
    pub fn pulse_width_isr(&mut self) {
        self.set_step_outputs(0);
        self.timer.stop();
        self.state = PulseState::Idle;
    }

    pub fn is_idle(&self) -> bool {
        self.state == PulseState::Idle
    }
}

/// Energizes stepper drivers ahead of motion. Seam for the tick facade,
/// which powers the drivers before starting the stepper timer.
pub trait StepperEnergize {
    fn energize(&mut self, axes: AxesSignals);
}

impl<SB, DB, EB, T> StepperEnergize for StepperDriver<SB, DB, EB, T>
where
    SB: ParallelOutputBus<Output = u8>,
    DB: ParallelOutputBus<Output = u8>,
    EB: ParallelOutputBus<Output = u8>,
    T: PulseTimer,
{
    fn energize(&mut self, axes: AxesSignals) {
        self.enable(axes);
    }
}
