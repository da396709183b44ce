use super::DerivedMetrics;

/// `numerator / denominator`, only when both are strictly positive and the result is finite.
fn positive_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if numerator > 0.0 && denominator > 0.0 {
        Some(numerator / denominator).filter(|ratio| ratio.is_finite())
    } else {
        None
    }
}

impl DerivedMetrics {
    /// Compute whichever metrics the available inputs allow.
    ///
    /// A metric is only present when every input it needs is present and non-zero, so no
    /// field ever holds an infinity or a NaN.
    pub fn derive(mean_runtime_s: Option<f64>, total_bytes: Option<u64>, total_ops: Option<u64>) -> Self {
        let runtime = mean_runtime_s.filter(|r| r.is_finite());
        let bytes = total_bytes.map(|b| b as f64);
        let ops = total_ops.map(|o| o as f64);

        let ratio = |num: Option<f64>, den: Option<f64>| positive_ratio(num?, den?);

        DerivedMetrics {
            arithmetic_intensity: ratio(ops, bytes),
            throughput_ops_per_s: ratio(ops, runtime),
            bandwidth_bytes_per_s: ratio(bytes, runtime),
        }
    }
}
