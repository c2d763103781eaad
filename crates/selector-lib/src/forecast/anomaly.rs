//! Latest-value anomaly detection
//!
//! Compares the newest value of a window against the mean and population
//! standard deviation of the values before it.

/// Default z-score above which the newest value is anomalous
pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;

/// Minimum window length required for detection
const MIN_SAMPLES_FOR_DETECTION: usize = 3;

/// Flags windows whose newest value deviates from the preceding history
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    /// Number of standard deviations to consider anomalous
    pub z_threshold: f64,
}

impl AnomalyDetector {
    pub fn new(z_threshold: f64) -> Self {
        Self { z_threshold }
    }

    /// Detect an anomaly in the newest value of `window`
    ///
    /// # Returns
    /// * `Some(LatestAnomaly)` if the z-score exceeds the threshold
    /// * `None` for short windows, zero variance, or normal values
    pub fn detect(&self, window: &[f64]) -> Option<LatestAnomaly> {
        if window.len() < MIN_SAMPLES_FOR_DETECTION {
            return None;
        }

        let (latest, history) = window.split_last()?;
        let n = history.len() as f64;
        let mean = history.iter().sum::<f64>() / n;
        let variance = history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        // Treat float noise around an exactly flat history as zero deviation
        if std_dev < f64::EPSILON {
            return None;
        }

        let z_score = ((latest - mean) / std_dev).abs();
        (z_score > self.z_threshold).then(|| LatestAnomaly {
            latest: *latest,
            mean,
            std_dev,
            z_score,
            threshold: self.z_threshold,
        })
    }

    pub fn is_anomaly(&self, window: &[f64]) -> bool {
        self.detect(window).is_some()
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_Z_THRESHOLD)
    }
}

/// Details of an anomalous newest value
#[derive(Debug, Clone, PartialEq)]
pub struct LatestAnomaly {
    pub latest: f64,
    /// Mean of the values preceding the newest one
    pub mean: f64,
    pub std_dev: f64,
    pub z_score: f64,
    pub threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_windows_never_anomalous() {
        let detector = AnomalyDetector::default();
        assert!(!detector.is_anomaly(&[]));
        assert!(!detector.is_anomaly(&[1.0]));
        assert!(!detector.is_anomaly(&[1.0, 100.0]));
    }

    #[test]
    fn test_zero_variance_history() {
        let detector = AnomalyDetector::default();
        assert!(!detector.is_anomaly(&[0.05, 0.05, 0.05]));
        assert!(!detector.is_anomaly(&[0.05, 0.05, 9.0]));
    }

    #[test]
    fn test_rounding_noise_counts_as_flat_history() {
        let detector = AnomalyDetector::default();
        // 0.1 + 0.2 and 0.3 differ only in the last bit
        assert!(!detector.is_anomaly(&[0.1 + 0.2, 0.3, 0.31]));
    }

    #[test]
    fn test_detect_spike() {
        let detector = AnomalyDetector::default();
        let anomaly = detector.detect(&[1.0, 1.1, 0.9, 1.0, 5.0]).unwrap();
        assert!((anomaly.mean - 1.0).abs() < 1e-9);
        assert!(anomaly.z_score > 50.0);
    }

    #[test]
    fn test_detect_drop() {
        let detector = AnomalyDetector::default();
        assert!(detector.is_anomaly(&[1.0, 1.1, 0.9, 1.0, 0.0]));
    }

    #[test]
    fn test_normal_value() {
        let detector = AnomalyDetector::default();
        // Population std of [1, 2, 1, 2] is 0.5, so 1.5 has z = 0
        assert!(!detector.is_anomaly(&[1.0, 2.0, 1.0, 2.0, 1.5]));
        // 2.9 sits 2.8 std devs above the mean
        assert!(detector.is_anomaly(&[1.0, 2.0, 1.0, 2.0, 2.9]));
        assert!(!AnomalyDetector::new(3.0).is_anomaly(&[1.0, 2.0, 1.0, 2.0, 2.9]));
    }
}
