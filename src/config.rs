/// Serial receive ring capacity in bytes, must be a power of two.
pub const RX_BUFFER_SIZE: usize = 1024;

/// Serial transmit ring capacity in bytes, must be a power of two.
pub const TX_BUFFER_SIZE: usize = 512;

/// ASCII CAN, injected ahead of unread input by `rx_cancel()`.
pub const ASCII_CAN: u8 = 0x18;

/// Realtime byte acknowledging a tool change, starts the Rx backup protocol.
pub const CMD_TOOL_ACK: u8 = 0xA3;

//-----------------------------------------------------------------------------

/// Debounce settle window, in debounce-timer periods.
pub const DEBOUNCE_TICKS: u8 = 3;

/// Pulse timer resolution: ticks per microsecond (0.2 us per count).
pub const PULSE_TICKS_PER_US: u16 = 5;

/// Clock feeding the spindle PWM timer, Hz.
pub const SPINDLE_PWM_CLOCK_HZ: u32 = 3_125_000;

/// Spindle speed override applied when none has been commanded, percent.
pub const DEFAULT_SPINDLE_RPM_OVERRIDE: u8 = 100;
