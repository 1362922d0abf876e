pub mod coolant;
pub mod debounce;
pub mod inputs;
pub mod spindle;
pub mod stepper;
