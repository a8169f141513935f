use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Per-hunt seeds derived from the run seed.
#[derive(Debug, Clone)]
pub struct HuntSchedule {
    seeds: Vec<u64>,
}

impl HuntSchedule {
    pub fn new(run_seed: u64, count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(run_seed);
        Self {
            seeds: (0..count).map(|_| rng.next_u64()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.seeds.iter().copied().enumerate()
    }
}
