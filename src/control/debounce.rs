//! Software debounce for the limit inputs: a countdown armed by the edge
//! interrupt and clocked by a fixed-period timer. The confirmed state is
//! whatever the inputs read at counter expiry, not at the original edge;
//! a bounce that settles back to rest within the window reports rest.

use crate::config::DEBOUNCE_TICKS;

/// Outcome of one debounce-timer period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebounceTick {
    /// Not armed, tick ignored.
    Inert,
    /// Still settling.
    Counting,
    /// Settle window elapsed; re-sample the inputs and stop the timer.
    Expired,
}

/// Countdown confirm state machine. Inert at zero; armed by an edge
/// interrupt; consumed by the debounce-timer interrupt.
#[derive(Debug, Default)]
pub struct Debouncer {
    count: u8,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    /// Arms (or re-arms) the settle window. Returns `true` when the
    /// debounce timer needs to be started, i.e. the counter was inert.
    pub fn arm(&mut self) -> bool {
        let was_inert = self.count == 0;
        self.count = DEBOUNCE_TICKS;
        was_inert
    }

    pub fn armed(&self) -> bool {
        self.count != 0
    }

    /// Advances the countdown by one timer period.
    pub fn tick(&mut self) -> DebounceTick {
        match self.count {
            0 => DebounceTick::Inert,
            1 => {
                self.count = 0;
                DebounceTick::Expired
            }
            _ => {
                self.count -= 1;
                DebounceTick::Counting
            }
        }
    }
}
