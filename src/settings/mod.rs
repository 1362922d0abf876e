//! Configuration surface consumed by the core. Ownership and persistence
//! belong to the surrounding system; the core only reads these at
//! settings-apply time.

use crate::signals::{AxesSignals, ControlSignals, CoolantState, SpindleState};

/// Boolean feature switches from the machine configuration.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SettingsFlags {
    pub hard_limits: bool,
    pub invert_probe_pin: bool,
    pub spindle_disable_with_zero_speed: bool,
}

/// Machine configuration consumed by the core.
///
/// Invert masks translate between electrical pin polarity and logical
/// triggered/asserted state; pull-up disable masks are consumed by the
/// firmware's pin setup, not by the core itself.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    pub step_invert: AxesSignals,
    pub dir_invert: AxesSignals,
    pub stepper_enable_invert: AxesSignals,
    /// Axes left de-energized when the steppers are otherwise enabled.
    pub stepper_deenergize: AxesSignals,

    pub limit_invert: AxesSignals,
    pub limit_disable_pullup: AxesSignals,
    pub control_invert: ControlSignals,
    pub control_disable_pullup: ControlSignals,

    pub spindle_invert: SpindleState,
    pub coolant_invert: CoolantState,

    /// Step pulse width, microseconds.
    pub pulse_microseconds: u16,
    /// Optional delay between direction and step assertion, microseconds.
    /// Zero selects the immediate pulse mode.
    pub pulse_delay_microseconds: u16,

    /// Spindle PWM carrier frequency, Hz.
    pub spindle_pwm_freq: u32,
    /// Duty for "spindle off", percent of the PWM period.
    pub spindle_pwm_off_value: f32,
    /// Duty floor, percent of the PWM period.
    pub spindle_pwm_min_value: f32,
    /// Duty ceiling, percent of the PWM period.
    pub spindle_pwm_max_value: f32,
    pub rpm_min: f32,
    pub rpm_max: f32,

    pub flags: SettingsFlags,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            step_invert: AxesSignals::empty(),
            dir_invert: AxesSignals::empty(),
            stepper_enable_invert: AxesSignals::empty(),
            stepper_deenergize: AxesSignals::empty(),

            limit_invert: AxesSignals::empty(),
            limit_disable_pullup: AxesSignals::empty(),
            control_invert: ControlSignals::empty(),
            control_disable_pullup: ControlSignals::empty(),

            spindle_invert: SpindleState::empty(),
            coolant_invert: CoolantState::empty(),

            pulse_microseconds: 10,
            pulse_delay_microseconds: 0,

            spindle_pwm_freq: 1_000,
            spindle_pwm_off_value: 0.0,
            spindle_pwm_min_value: 0.0,
            spindle_pwm_max_value: 100.0,
            rpm_min: 0.0,
            rpm_max: 1_000.0,

            flags: SettingsFlags::default(),
        }
    }
}

/// Driver capabilities, negotiated once with the surrounding system.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverCaps {
    pub variable_spindle: bool,
    pub spindle_dir: bool,
    pub mist_control: bool,
    pub software_debounce: bool,
    pub step_pulse_delay: bool,
    /// Adaptive multi-axis step-smoothing level; 0 selects the prescaled
    /// stepper-timer strategy.
    pub amass_level: u8,
}

impl Default for DriverCaps {
    fn default() -> Self {
        Self {
            variable_spindle: true,
            spindle_dir: true,
            mist_control: true,
            software_debounce: true,
            step_pulse_delay: true,
            amass_level: 3,
        }
    }
}
