use core::convert::Infallible;

use embedded_hal::digital::v2::OutputPin;

/// A group of output pins driven as one value, LSB first.
pub trait ParallelOutputBus {
    type Output;
    fn set(&mut self, value: Self::Output);
}

pub struct SimpleParallelOutputBus<T: OutputPin<Error = Infallible>, const COUNT: usize>(
    pub [T; COUNT],
);

impl<T: OutputPin<Error = Infallible>, const COUNT: usize> ParallelOutputBus
    for SimpleParallelOutputBus<T, COUNT>
{
    type Output = u8;

    fn set(&mut self, value: Self::Output) {
        for (i, p) in self.0.iter_mut().enumerate() {
            let _ = if value & (1 << i) != 0 {
                p.set_high()
            } else {
                p.set_low()
            };
        }
    }
}
