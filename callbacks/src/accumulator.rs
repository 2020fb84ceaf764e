use crate::logs::{Logs, keys};

/// Batch-size weighted running totals of loss and accuracy over one epoch.
///
/// Each callback that needs epoch averages owns its own accumulator; they
/// never share state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochAccumulator {
    seen: usize,
    total_loss: f64,
    total_accuracy: f64,
}

impl EpochAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Adds one batch worth of metrics, weighting each value by `size`.
    pub fn record(&mut self, size: usize, loss: f64, accuracy: Option<f64>) {
        self.seen = self.seen.saturating_add(size);
        self.total_loss += loss * size as f64;
        if let Some(accuracy) = accuracy {
            self.total_accuracy += accuracy * size as f64;
        }
    }

    /// Records a batch straight from its logs, treating absent values as zero.
    pub fn record_logs(&mut self, logs: &Logs, show_accuracy: bool) {
        let accuracy = show_accuracy.then(|| logs.get_or(keys::ACCURACY, 0.0));
        self.record(logs.size(), logs.get_or(keys::LOSS, 0.0), accuracy);
    }

    /// Number of samples seen so far this epoch.
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Weighted mean loss; NaN before any sample has been seen.
    pub fn loss(&self) -> f64 {
        self.total_loss / self.seen as f64
    }

    /// Weighted mean accuracy; NaN before any sample has been seen.
    pub fn accuracy(&self) -> f64 {
        self.total_accuracy / self.seen as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_weighted_average() {
        let mut acc = EpochAccumulator::new();
        acc.record(10, 1.0, Some(0.5));
        acc.record(30, 2.0, Some(1.0));

        assert_eq!(acc.seen(), 40);
        assert_relative_eq!(acc.loss(), 1.75, epsilon = 1e-12);
        assert_relative_eq!(acc.accuracy(), 0.875, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_epoch_is_nan() {
        let acc = EpochAccumulator::new();
        assert!(acc.loss().is_nan());
    }

    #[test]
    fn test_record_logs_defaults_missing_values() {
        let mut acc = EpochAccumulator::new();
        acc.record_logs(&Logs::new().with(keys::SIZE, 4.0), true);
        acc.record_logs(
            &Logs::new().with(keys::SIZE, 4.0).with(keys::LOSS, 1.0),
            false,
        );

        assert_eq!(acc.seen(), 8);
        assert_relative_eq!(acc.loss(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(acc.accuracy(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_huge_batch_size_saturates() {
        let mut acc = EpochAccumulator::new();
        acc.record_logs(&Logs::new().with(keys::SIZE, 1e30).with(keys::LOSS, 1.0), false);
        acc.record_logs(&Logs::new().with(keys::SIZE, 2.0).with(keys::LOSS, 1.0), false);
        assert_eq!(acc.seen(), usize::MAX);
    }

    #[test]
    fn test_reset() {
        let mut acc = EpochAccumulator::new();
        acc.record(5, 1.0, None);
        acc.reset();
        assert_eq!(acc, EpochAccumulator::default());
    }
}
