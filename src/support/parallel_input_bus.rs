use core::convert::Infallible;

use embedded_hal::digital::v2::InputPin;

/// A group of input pins sampled as one value, LSB first.
pub trait ParallelInputBus {
    type Input;
    fn get(&self) -> Self::Input;
}

pub struct SimpleParallelInputBus<T: InputPin<Error = Infallible>, const COUNT: usize>(
    pub [T; COUNT],
);

impl<T: InputPin<Error = Infallible>, const COUNT: usize> ParallelInputBus
    for SimpleParallelInputBus<T, COUNT>
{
    type Input = u8;

    fn get(&self) -> Self::Input {
        let mut res = 0;

        for (i, p) in self.0.iter().enumerate() {
            if let Ok(true) = p.is_high() {
                res |= 1 << i;
            }
        }

        res
    }
}
