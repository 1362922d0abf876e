//! Flood/mist coolant outputs.

use core::convert::Infallible;

use embedded_hal::digital::v2::OutputPin;

use crate::signals::CoolantState;

pub struct CoolantControl<FLOOD, MIST>
where
    FLOOD: OutputPin<Error = Infallible>,
    MIST: OutputPin<Error = Infallible>,
{
    flood_pin: FLOOD,
    /// `None` when mist control is not fitted.
    mist_pin: Option<MIST>,
    invert: CoolantState,
    state: CoolantState,
}

impl<FLOOD, MIST> CoolantControl<FLOOD, MIST>
where
    FLOOD: OutputPin<Error = Infallible>,
    MIST: OutputPin<Error = Infallible>,
{
    pub fn new(flood_pin: FLOOD, mist_pin: Option<MIST>) -> Self {
        let mut this = Self {
            flood_pin,
            mist_pin,
            invert: CoolantState::empty(),
            state: CoolantState::empty(),
        };
        this.set_state(CoolantState::empty());
        this
    }

    pub fn set_invert(&mut self, invert: CoolantState) {
        self.invert = invert;
    }

    /// Drives the coolant outputs to the requested logical state.
    pub fn set_state(&mut self, mode: CoolantState) {
        let pins = mode.invert(self.invert);

        let _ = if pins.flood() {
            self.flood_pin.set_high()
        } else {
            self.flood_pin.set_low()
        };

        if let Some(mist) = self.mist_pin.as_mut() {
            let _ = if pins.mist() {
                mist.set_high()
            } else {
                mist.set_low()
            };
        }

        self.state = mode;
    }

    /// Tracked logical state; the invert mask already applied at the pins.
    pub fn get_state(&self) -> CoolantState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct PinState {
        high: Cell<bool>,
    }

    struct FakePin(Rc<PinState>);

    impl OutputPin for FakePin {
        type Error = Infallible;

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.high.set(true);
            Ok(())
        }

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.high.set(false);
            Ok(())
        }
    }

    #[test]
    fn drives_flood_and_mist() {
        let flood = Rc::new(PinState::default());
        let mist = Rc::new(PinState::default());
        let mut coolant = CoolantControl::new(FakePin(flood.clone()), Some(FakePin(mist.clone())));

        coolant.set_state(CoolantState::new(CoolantState::FLOOD));
        assert!(flood.high.get());
        assert!(!mist.high.get());
        assert!(coolant.get_state().flood());

        coolant.set_state(CoolantState::new(CoolantState::MIST));
        assert!(!flood.high.get());
        assert!(mist.high.get());
    }

    #[test]
    fn invert_mask_flips_pin_polarity_not_logical_state() {
        let flood = Rc::new(PinState::default());
        let mut coolant: CoolantControl<FakePin, FakePin> =
            CoolantControl::new(FakePin(flood.clone()), None);
        coolant.set_invert(CoolantState::new(CoolantState::FLOOD));

        coolant.set_state(CoolantState::new(CoolantState::FLOOD));
        assert!(!flood.high.get());
        assert!(coolant.get_state().flood());

        coolant.set_state(CoolantState::empty());
        assert!(flood.high.get());
        assert!(!coolant.get_state().flood());
    }
}
