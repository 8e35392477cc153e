//! Exact presentation timestamps.
//!
//! Timestamps are kept as rationals so frame `i` at `fps` is exactly `i/fps`
//! no matter how long the sequence is.

use std::cmp::Ordering;
use std::fmt;

/// A rational time value in seconds.
#[derive(Clone, Copy, Eq)]
pub struct Timestamp {
    /// Numerator
    pub num: i64,
    /// Denominator (always positive)
    pub den: i64,
}

impl Timestamp {
    /// Create a new timestamp of `num/den` seconds.
    ///
    /// # Panics
    ///
    /// Panics if denominator is zero.
    pub fn new(num: i64, den: i64) -> Self {
        assert!(den != 0, "Denominator cannot be zero");
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        Self { num, den }
    }

    pub const fn zero() -> Self {
        Self { num: 0, den: 1 }
    }

    /// Presentation time of frame `index` in a stream running at `fps`.
    pub fn for_frame(index: usize, fps: u32) -> Self {
        Self::new(index as i64, i64::from(fps))
    }

    /// Reduce to lowest terms.
    pub fn reduce(&self) -> Self {
        if self.num == 0 {
            return Self::zero();
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs());
        Self {
            num: self.num / g as i64,
            den: self.den / g as i64,
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

impl std::hash::Hash for Timestamp {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        let reduced = self.reduce();
        reduced.num.hash(state);
        reduced.den.hash(state);
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}/{})", self.num, self.den)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reduced = self.reduce();
        if reduced.den == 1 {
            write!(f, "{}s", reduced.num)
        } else {
            write!(f, "{}/{}s", reduced.num, reduced.den)
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
