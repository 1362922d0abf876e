//! Spindle control: RPM to PWM-duty mapping over a calibrated linear
//! gradient, plus on/off/direction handling for both variable-speed and
//! on/off-only configurations.

use core::convert::Infallible;

use embedded_hal::digital::v2::OutputPin;
use embedded_hal::PwmPin;

use crate::config::SPINDLE_PWM_CLOCK_HZ;
use crate::settings::Settings;
use crate::signals::SpindleState;

/// PWM mapping derived from the machine settings, recomputed on every
/// settings change.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpindlePwm {
    pub period: u16,
    pub off_value: u16,
    pub min_value: u16,
    pub max_value: u16,
    /// Duty counts per RPM over the usable range.
    pub gradient: f32,
}

impl SpindlePwm {
    pub fn compute(settings: &Settings) -> Self {
        let period = (SPINDLE_PWM_CLOCK_HZ / settings.spindle_pwm_freq) as u16;
        let percent = |v: f32| (period as f32 * v / 100.0) as u16;

        let off_value = percent(settings.spindle_pwm_off_value);
        let min_value = percent(settings.spindle_pwm_min_value);
        let max_value = percent(settings.spindle_pwm_max_value);

        Self {
            period,
            off_value,
            min_value,
            max_value,
            gradient: (max_value - min_value) as f32 / (settings.rpm_max - settings.rpm_min),
        }
    }
}

/// Duty value plus the RPM it actually realizes after clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmSpeed {
    pub duty: u16,
    pub rpm: f32,
}

/// Programs a spindle duty value. Seam for the stepper pulse hot path,
/// which refreshes the duty lazily mid-segment.
pub trait SpindleSpeed {
    /// Applies `duty` and returns the value now in effect.
    fn set_speed(&mut self, duty: u16) -> u16;
}

/// Spindle enable/direction/PWM composition.
pub struct SpindleController<EN, DIR, PWM>
where
    EN: OutputPin<Error = Infallible>,
    DIR: OutputPin<Error = Infallible>,
    PWM: PwmPin<Duty = u16>,
{
    enable_pin: EN,
    /// `None` when the driver lacks direction control.
    direction_pin: Option<DIR>,
    pwm: PWM,

    pwm_cfg: SpindlePwm,
    invert: SpindleState,
    rpm_min: f32,
    rpm_max: f32,
    disable_with_zero_speed: bool,
    variable: bool,

    pwm_enabled: bool,
    state: SpindleState,
}

impl<EN, DIR, PWM> SpindleController<EN, DIR, PWM>
where
    EN: OutputPin<Error = Infallible>,
    DIR: OutputPin<Error = Infallible>,
    PWM: PwmPin<Duty = u16>,
{
    pub fn new(enable_pin: EN, direction_pin: Option<DIR>, pwm: PWM, variable: bool) -> Self {
        let mut this = Self {
            enable_pin,
            direction_pin,
            pwm,

            pwm_cfg: SpindlePwm::default(),
            invert: SpindleState::empty(),
            rpm_min: 0.0,
            rpm_max: 0.0,
            disable_with_zero_speed: false,
            variable,

            pwm_enabled: false,
            state: SpindleState::empty(),
        };
        this.spindle_off();
        this
    }

    /// Re-derives the PWM mapping. The swap runs in a critical section so
    /// an in-flight `set_speed` from the pulse path never sees a
    /// half-updated gradient.
    pub fn apply_settings(&mut self, settings: &Settings) {
        let cfg = SpindlePwm::compute(settings);
        critical_section::with(|_| {
            self.pwm_cfg = cfg;
            self.invert = settings.spindle_invert;
            self.rpm_min = settings.rpm_min;
            self.rpm_max = settings.rpm_max;
            self.disable_with_zero_speed = settings.flags.spindle_disable_with_zero_speed;
        });
        debug!(
            "spindle pwm: period {} off {} min {} max {}",
            cfg.period, cfg.off_value, cfg.min_value, cfg.max_value
        );
    }

    pub fn pwm_config(&self) -> SpindlePwm {
        self.pwm_cfg
    }

    fn spindle_off(&mut self) {
        let _ = if self.invert.on() {
            self.enable_pin.set_high()
        } else {
            self.enable_pin.set_low()
        };
        self.state = SpindleState::new(self.state.bits() & !SpindleState::ON);
    }

    fn spindle_on(&mut self) {
        let _ = if self.invert.on() {
            self.enable_pin.set_low()
        } else {
            self.enable_pin.set_high()
        };
        self.state = SpindleState::new(self.state.bits() | SpindleState::ON);
    }

    fn spindle_dir(&mut self, ccw: bool) {
        let inverted = ccw ^ self.invert.ccw();
        if let Some(pin) = self.direction_pin.as_mut() {
            let _ = if inverted {
                pin.set_high()
            } else {
                pin.set_low()
            };
            self.state = SpindleState::new(if ccw {
                self.state.bits() | SpindleState::CCW
            } else {
                self.state.bits() & !SpindleState::CCW
            });
        }
    }

    /// Maps a commanded RPM and override percentage onto a duty value.
    /// Kept small: this runs from the stepper pulse path.
    pub fn compute_pwm(&self, rpm: f32, override_pct: u8) -> PwmSpeed {
        let rpm = rpm * (0.01 * override_pct as f32);

        if self.rpm_min >= self.rpm_max || rpm >= self.rpm_max {
            // No usable range, or commanded at/above ceiling: full on.
            PwmSpeed {
                duty: self.pwm_cfg.max_value - 1,
                rpm: self.rpm_max,
            }
        } else if rpm <= self.rpm_min {
            if rpm == 0.0 {
                PwmSpeed {
                    duty: self.pwm_cfg.off_value,
                    rpm: 0.0,
                }
            } else {
                PwmSpeed {
                    duty: self.pwm_cfg.min_value,
                    rpm: self.rpm_min,
                }
            }
        } else {
            let duty = libm::floorf((rpm - self.rpm_min) * self.pwm_cfg.gradient) as u16
                + self.pwm_cfg.min_value;
            PwmSpeed {
                duty: duty.min(self.pwm_cfg.max_value - 1),
                rpm,
            }
        }
    }

    /// Starts or stops the spindle, composing direction, enable and duty
    /// according to the variable-speed capability.
    pub fn set_state(&mut self, state: SpindleState, rpm: f32, override_pct: u8) {
        if self.variable {
            if !state.on() || rpm == 0.0 {
                self.set_speed(self.pwm_cfg.off_value);
                self.spindle_off();
            } else {
                self.spindle_dir(state.ccw());
                let speed = self.compute_pwm(rpm, override_pct);
                self.set_speed(speed.duty);
            }
        } else if !state.on() {
            self.spindle_off();
        } else {
            self.spindle_dir(state.ccw());
            self.spindle_on();
        }
    }

    /// Tracked logical state. Invert masks apply only at the pin writes, so
    /// this reads back without a second inversion.
    pub fn get_state(&self) -> SpindleState {
        if self.pwm_enabled {
            SpindleState::new(self.state.bits() | SpindleState::ON)
        } else {
            self.state
        }
    }
}

impl<EN, DIR, PWM> SpindleSpeed for SpindleController<EN, DIR, PWM>
where
    EN: OutputPin<Error = Infallible>,
    DIR: OutputPin<Error = Infallible>,
    PWM: PwmPin<Duty = u16>,
{
    fn set_speed(&mut self, duty: u16) -> u16 {
        if duty == self.pwm_cfg.off_value {
            self.pwm_enabled = false;
            if self.disable_with_zero_speed {
                self.spindle_off();
            }
            self.pwm.disable();
        } else {
            if !self.pwm_enabled {
                self.spindle_on();
                self.pwm_enabled = true;
            }
            self.pwm.set_duty(duty);
            self.pwm.enable();
        }

        duty
    }
}
