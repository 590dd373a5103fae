//! Sliding Moments
//!
//! Bounded sliding-window aggregator over paired samples. Keeps only the
//! sufficient statistics (n, Σx, Σy, Σx², Σy², Σxy) plus the raw window
//! needed for eviction, so add and evict are both O(1).
//!
//! Subtracting evicted samples accumulates rounding error over an unbounded
//! stream, so the sums are re-derived from the window contents every
//! `resync_interval` evictions.

use std::collections::VecDeque;

use crate::domain::error::{reserve_window, PipelineError};

/// Centered second moments of the current window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub n: usize,
    pub mean_x: f64,
    pub mean_y: f64,
    /// Σ(x - x̄)²
    pub sxx: f64,
    /// Σ(y - ȳ)²
    pub syy: f64,
    /// Σ(x - x̄)(y - ȳ)
    pub sxy: f64,
}

#[derive(Debug, Clone)]
pub struct SlidingMoments {
    window: VecDeque<(f64, f64)>,
    capacity: usize,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_yy: f64,
    sum_xy: f64,
    evictions_since_resync: usize,
    resync_interval: usize,
}

impl SlidingMoments {
    /// `resync_interval == 0` resyncs once per full window turnover
    pub fn new(capacity: usize, resync_interval: usize) -> Result<Self, PipelineError> {
        Ok(Self {
            window: reserve_window("regression window", capacity)?,
            capacity,
            sum_x: 0.0,
            sum_y: 0.0,
            sum_xx: 0.0,
            sum_yy: 0.0,
            sum_xy: 0.0,
            evictions_since_resync: 0,
            resync_interval: if resync_interval == 0 { capacity } else { resync_interval },
        })
    }

    /// Add a sample, evicting the oldest when full. Returns the evicted sample.
    pub fn push(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        let evicted = if self.window.len() == self.capacity {
            let oldest = self.window.pop_front();
            if let Some((ox, oy)) = oldest {
                self.sum_x -= ox;
                self.sum_y -= oy;
                self.sum_xx -= ox * ox;
                self.sum_yy -= oy * oy;
                self.sum_xy -= ox * oy;
                self.evictions_since_resync += 1;
            }
            oldest
        } else {
            None
        };

        self.window.push_back((x, y));
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_yy += y * y;
        self.sum_xy += x * y;

        if self.evictions_since_resync >= self.resync_interval {
            self.resync();
        }
        evicted
    }

    /// Recompute every running sum from the window contents
    pub fn resync(&mut self) {
        let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(x, y) in &self.window {
            sx += x;
            sy += y;
            sxx += x * x;
            syy += y * y;
            sxy += x * y;
        }
        self.sum_x = sx;
        self.sum_y = sy;
        self.sum_xx = sxx;
        self.sum_yy = syy;
        self.sum_xy = sxy;
        self.evictions_since_resync = 0;
    }

    /// Centered moments, `None` on an empty window
    pub fn moments(&self) -> Option<Moments> {
        let n = self.window.len();
        if n == 0 {
            return None;
        }
        let nf = n as f64;
        let mean_x = self.sum_x / nf;
        let mean_y = self.sum_y / nf;
        Some(Moments {
            n,
            mean_x,
            mean_y,
            // clamp away negative round-off on near-constant windows
            sxx: (self.sum_xx - nf * mean_x * mean_x).max(0.0),
            syy: (self.sum_yy - nf * mean_y * mean_y).max(0.0),
            sxy: self.sum_xy - nf * mean_x * mean_y,
        })
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.window.iter()
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.resync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use statrs::statistics::Statistics;

    #[test]
    fn test_push_and_evict() {
        let mut m = SlidingMoments::new(3, 0).unwrap();
        assert!(m.push(1.0, 2.0).is_none());
        assert!(m.push(2.0, 4.0).is_none());
        assert!(m.push(3.0, 6.0).is_none());
        assert!(m.is_full());
        assert_eq!(m.push(4.0, 8.0), Some((1.0, 2.0)));
        assert_eq!(m.len(), 3);

        let moments = m.moments().unwrap();
        assert_relative_eq!(moments.mean_x, 3.0);
        assert_relative_eq!(moments.mean_y, 6.0);
        assert_relative_eq!(moments.sxx, 2.0, epsilon = 1e-12);
        assert_relative_eq!(moments.sxy, 4.0, epsilon = 1e-12);
        assert_relative_eq!(moments.syy, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_window_has_no_moments() {
        let m = SlidingMoments::new(3, 0).unwrap();
        assert!(m.moments().is_none());
        assert!(m.is_empty());
    }

    #[test]
    fn test_matches_direct_statistics() {
        let mut m = SlidingMoments::new(50, 7).unwrap();
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for i in 0..500 {
            let x = ((i * 37 % 101) as f64 - 50.0) * 1e-4;
            let y = 0.7 * x + ((i * 13 % 17) as f64 - 8.0) * 1e-5;
            m.push(x, y);
            xs.push(x);
            ys.push(y);
        }
        let tail_x = &xs[xs.len() - 50..];
        let tail_y = &ys[ys.len() - 50..];
        let moments = m.moments().unwrap();

        assert_relative_eq!(moments.mean_x, tail_x.iter().mean(), epsilon = 1e-12);
        assert_relative_eq!(moments.mean_y, tail_y.iter().mean(), epsilon = 1e-12);
        assert_relative_eq!(moments.sxx / 49.0, tail_x.iter().variance(), epsilon = 1e-12);
        assert_relative_eq!(
            moments.sxy / 49.0,
            tail_x.iter().covariance(tail_y.iter()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_resync_cancels_drift() {
        let mut m = SlidingMoments::new(4, 1_000_000).unwrap();
        // a huge sample passes through the window and leaves residue in the sums
        m.push(1e12, 1e12);
        for _ in 0..4 {
            m.push(1e-3, 2e-3);
        }
        m.resync();
        let moments = m.moments().unwrap();
        assert_relative_eq!(moments.mean_x, 1e-3, epsilon = 1e-15);
        assert!(moments.sxx < 1e-18);
    }

    #[test]
    fn test_constant_window_has_zero_variance() {
        let mut m = SlidingMoments::new(5, 0).unwrap();
        for _ in 0..20 {
            m.push(0.001, 0.002);
        }
        let moments = m.moments().unwrap();
        assert!(moments.sxx < 1e-18);
    }
}
