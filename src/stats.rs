//! Small statistics helpers shared by the aggregator and threshold estimator

/// Mean and sample standard deviation of a series
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub mean: f32,
    pub stddev: f32,
    pub count: usize,
}

impl Moments {
    /// Compute mean and sample (N-1) standard deviation.
    ///
    /// An empty series yields all zeros; a single value has zero spread.
    pub fn of<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f32>,
        I::IntoIter: Clone,
    {
        let iter = values.into_iter();
        let (sum, count) = iter.clone().fold((0.0f32, 0usize), |(s, n), v| (s + v, n + 1));
        if count == 0 {
            return Self::default();
        }
        let mean = sum / count as f32;

        let stddev = if count > 1 {
            let var: f32 = iter.map(|v| (v - mean) * (v - mean)).sum();
            (var / (count - 1) as f32).sqrt()
        } else {
            0.0
        };

        Self {
            mean,
            stddev,
            count,
        }
    }

    /// mean + k * stddev
    pub fn upper(&self, k: f32) -> f32 {
        self.mean + k * self.stddev
    }
}

/// Median of three values
pub fn median3(a: f32, b: f32, c: f32) -> f32 {
    a.max(b).min(a.min(b).max(c))
}

/// Median of five values
pub fn median5(values: [f32; 5]) -> f32 {
    let mut sorted = values;
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_stddev() {
        let m = Moments::of([2.0f32, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((m.mean - 5.0).abs() < 1e-6);
        // Sample variance = 32 / 7
        assert!((m.stddev - (32.0f32 / 7.0).sqrt()).abs() < 1e-5);
        assert_eq!(m.count, 8);
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(Moments::of(Vec::<f32>::new()), Moments::default());
        let single = Moments::of([42.0f32]);
        assert_eq!(single.mean, 42.0);
        assert_eq!(single.stddev, 0.0);
    }

    #[test]
    fn test_medians() {
        assert_eq!(median3(3.0, 1.0, 2.0), 2.0);
        assert_eq!(median3(5.0, 5.0, 1.0), 5.0);
        assert_eq!(median5([9.0, 1.0, 7.0, 3.0, 5.0]), 5.0);
    }
}
