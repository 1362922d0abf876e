//! Bitfield-style signal sets exchanged between the core and its
//! collaborators. Each set is a thin mask newtype; invert masks are applied
//! with [`invert`](AxesSignals::invert) exactly once per hardware/logical
//! domain crossing.

/// Per-axis boolean signals (step, direction, enable or limit, depending on
/// context). Bit 0 is X, bit 1 is Y, bit 2 is Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxesSignals(u8);

impl AxesSignals {
    pub const X: u8 = 1 << 0;
    pub const Y: u8 = 1 << 1;
    pub const Z: u8 = 1 << 2;
    pub const MASK: u8 = Self::X | Self::Y | Self::Z;

    pub const fn new(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(Self::MASK)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when at least one axis is asserted.
    pub const fn any(self) -> bool {
        self.0 != 0
    }

    pub const fn x(self) -> bool {
        self.0 & Self::X != 0
    }

    pub const fn y(self) -> bool {
        self.0 & Self::Y != 0
    }

    pub const fn z(self) -> bool {
        self.0 & Self::Z != 0
    }

    /// XOR-applies an invert mask, crossing between the electrical and the
    /// logical domain.
    pub const fn invert(self, mask: Self) -> Self {
        Self(self.0 ^ mask.0)
    }
}

/// System control signals. Only one is ever reported asserted at a time,
/// see the priority decode in [`crate::control::inputs::ControlInputs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlSignals(u8);

impl ControlSignals {
    pub const RESET: u8 = 1 << 0;
    pub const FEED_HOLD: u8 = 1 << 1;
    pub const CYCLE_START: u8 = 1 << 2;
    pub const SAFETY_DOOR: u8 = 1 << 3;
    pub const MASK: u8 = Self::RESET | Self::FEED_HOLD | Self::CYCLE_START | Self::SAFETY_DOOR;

    pub const fn new(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn any(self) -> bool {
        self.0 != 0
    }

    pub const fn reset(self) -> bool {
        self.0 & Self::RESET != 0
    }

    pub const fn feed_hold(self) -> bool {
        self.0 & Self::FEED_HOLD != 0
    }

    pub const fn cycle_start(self) -> bool {
        self.0 & Self::CYCLE_START != 0
    }

    pub const fn safety_door(self) -> bool {
        self.0 & Self::SAFETY_DOOR != 0
    }

    pub const fn invert(self, mask: Self) -> Self {
        Self(self.0 ^ mask.0)
    }
}

/// Spindle on/direction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpindleState(u8);

impl SpindleState {
    pub const ON: u8 = 1 << 0;
    pub const CCW: u8 = 1 << 1;
    pub const MASK: u8 = Self::ON | Self::CCW;

    pub const fn new(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn cw() -> Self {
        Self(Self::ON)
    }

    pub const fn ccw_on() -> Self {
        Self(Self::ON | Self::CCW)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn on(self) -> bool {
        self.0 & Self::ON != 0
    }

    pub const fn ccw(self) -> bool {
        self.0 & Self::CCW != 0
    }

    pub const fn invert(self, mask: Self) -> Self {
        Self(self.0 ^ mask.0)
    }
}

/// Coolant output state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoolantState(u8);

impl CoolantState {
    pub const FLOOD: u8 = 1 << 0;
    pub const MIST: u8 = 1 << 1;
    pub const MASK: u8 = Self::FLOOD | Self::MIST;

    pub const fn new(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn flood(self) -> bool {
        self.0 & Self::FLOOD != 0
    }

    pub const fn mist(self) -> bool {
        self.0 & Self::MIST != 0
    }

    pub const fn invert(self, mask: Self) -> Self {
        Self(self.0 ^ mask.0)
    }
}
