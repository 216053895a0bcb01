/// Mean of the last `N` samples, or of every sample until `N` have been taken.
/// Used for the interval between published RC frames.
pub struct MovingAverage<const N: usize> {
    samples: [i64; N],
    length: usize,
    position: usize,
}

impl<const N: usize> MovingAverage<N> {
    pub fn new() -> Self {
        Self {
            samples: [0; N],
            length: 0,
            position: 0,
        }
    }

    pub fn get_average(&self) -> i64 {
        if self.length == 0 {
            return 0;
        }

        // wide enough that N samples of any i64 cannot overflow
        let total: i128 = self.samples[..self.length]
            .iter()
            .map(|&sample| i128::from(sample))
            .sum();
        (total / self.length as i128) as i64
    }

    pub fn sample(&mut self, sample: i64) {
        self.samples[self.position] = sample;
        self.position += 1;
        if self.position >= N {
            self.position = 0;
        }
        if self.length != N {
            self.length += 1;
        }
    }

    pub fn reset(&mut self) {
        self.samples = [0; N];
        self.length = 0;
        self.position = 0;
    }
}

impl<const N: usize> Default for MovingAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}
