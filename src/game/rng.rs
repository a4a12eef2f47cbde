//! Seeded linear-congruential generator used for level layout
//!
//! The recurrence is `seed' = (seed * 9301 + 49297) mod 233280`. It is small
//! enough that a browser peer running the same recurrence on doubles produces
//! the same stream, which is what lets a level be regenerated from its seed.

const MULTIPLIER: u64 = 9301;
const INCREMENT: u64 = 49297;
const MODULUS: u64 = 233_280;

/// Deterministic random stream over `[0, 1)`
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Advance the stream and return a value in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        // Reducing first keeps the product far away from u64 overflow for
        // timestamp-sized seeds without changing the residue.
        self.state = ((self.state % MODULUS) * MULTIPLIER + INCREMENT) % MODULUS;
        self.state as f64 / MODULUS as f64
    }

    /// Uniform value in `[min, max)`
    pub fn between(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }

    /// Uniform integer in `[min, max]` (inclusive)
    pub fn int_between(&mut self, min: i64, max: i64) -> i64 {
        self.between(min as f64, (max + 1) as f64).floor() as i64
    }

    /// Current internal state (the seed of the next draw)
    pub fn state(&self) -> u64 {
        self.state
    }
}

/// Pure form of the recurrence: returns `(value, next_seed)`
pub fn next(seed: u64) -> (f64, u64) {
    let mut rng = SeededRandom::new(seed);
    let value = rng.next_f64();
    (value, rng.state())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sequence() {
        // (1 * 9301 + 49297) % 233280 = 58598
        let (value, seed) = next(1);
        assert_eq!(seed, 58598);
        assert!((value - 58598.0 / 233280.0).abs() < f64::EPSILON);

        // (58598 * 9301 + 49297) % 233280
        let (_, seed2) = next(seed);
        assert_eq!(seed2, (58598 * 9301 + 49297) % 233280);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SeededRandom::new(12345);
        let mut b = SeededRandom::new(12345);
        for _ in 0..1000 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn test_large_seed_matches_reduced_seed() {
        let large = 1_700_000_000_123u64;
        let mut a = SeededRandom::new(large);
        let mut b = SeededRandom::new(large % MODULUS);
        for _ in 0..50 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn test_ranges() {
        let mut rng = SeededRandom::new(42);
        for _ in 0..5000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));

            let b = rng.between(-10.0, 10.0);
            assert!((-10.0..10.0).contains(&b));

            let i = rng.int_between(0, 3);
            assert!((0..=3).contains(&i));
        }
    }

    #[test]
    fn test_int_between_reaches_both_ends() {
        let mut rng = SeededRandom::new(7);
        let mut seen = [false; 4];
        for _ in 0..2000 {
            seen[rng.int_between(0, 3) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
