use std::time::Duration;

use super::Latency;

impl Latency {
    /// Summarize timed runs. Returns `None` when there is no sample to summarize.
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let samples_s: Vec<f64> = samples.iter().map(Duration::as_secs_f64).collect();
        let mean_s = samples_s.iter().sum::<f64>() / samples_s.len() as f64;
        let stdev_s = sample_stdev(&samples_s, mean_s);

        Some(Latency {
            samples_s,
            mean_s,
            stdev_s,
        })
    }

    /// Standard deviation relative to the mean, or 0 for a zero mean.
    pub fn relative_stdev(&self) -> f64 {
        if self.mean_s > 0.0 {
            self.stdev_s / self.mean_s
        } else {
            0.0
        }
    }
}

/// Calculate sample standard deviation (n-1 denominator).
/// Matches python's statistics.stdev, and is 0 for a single sample.
fn sample_stdev(data: &[f64], mean: f64) -> f64 {
    let n = data.len();
    if n <= 1 {
        return 0.0;
    }
    let variance: f64 = data
        .iter()
        .map(|&t| {
            let diff = t - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_runs() {
        let latency = Latency::from_samples(&[
            Duration::from_secs_f64(1.0),
            Duration::from_secs_f64(1.2),
            Duration::from_secs_f64(0.8),
        ])
        .unwrap();

        assert!((latency.mean_s - 1.0).abs() < 1e-9);
        assert!((latency.stdev_s - 0.2).abs() < 1e-9);
        assert_eq!(latency.samples_s.len(), 3);
        // Invocation order is kept
        assert!((latency.samples_s[1] - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_single_run_has_zero_stdev() {
        let latency = Latency::from_samples(&[Duration::from_millis(42)]).unwrap();
        assert!((latency.mean_s - 0.042).abs() < 1e-12);
        assert_eq!(latency.stdev_s, 0.);
    }

    #[test]
    fn test_no_samples() {
        assert!(Latency::from_samples(&[]).is_none());
    }

    #[test]
    fn test_order_does_not_change_summary() {
        let a = Latency::from_samples(&[Duration::from_millis(5), Duration::from_millis(9)]).unwrap();
        let b = Latency::from_samples(&[Duration::from_millis(9), Duration::from_millis(5)]).unwrap();
        assert_eq!(a.mean_s, b.mean_s);
        assert_eq!(a.stdev_s, b.stdev_s);
    }
}
