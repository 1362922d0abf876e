pub mod parallel_input_bus;
pub mod parallel_output_bus;
pub mod timers;

pub use parallel_input_bus::{ParallelInputBus, SimpleParallelInputBus};
pub use parallel_output_bus::{ParallelOutputBus, SimpleParallelOutputBus};
pub use timers::{DebounceTimer, DelayTimer, Prescaler, PulseTimer, StepperTimer};
