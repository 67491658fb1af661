use std::collections::VecDeque;

use crate::math::Vec3;

/// Rolling average over the most recent samples. A capacity of zero disables
/// smoothing and passes samples straight through.
#[derive(Debug, Clone)]
pub struct Smoother {
    capacity: usize,
    samples: VecDeque<Vec3>,
}

impl Smoother {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn update(&mut self, sample: Vec3) -> Vec3 {
        if self.capacity == 0 {
            return sample;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);

        let sum = self
            .samples
            .iter()
            .fold(Vec3::ZERO, |acc, value| acc + *value);
        sum / self.samples.len() as f32
    }
}
