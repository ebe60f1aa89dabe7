//! Network-adjusted time.
//!
//! Wall clocks drift, so contextual time checks use the local clock
//! shifted by the median of the offsets our peers have reported. An NTP
//! sanity source is a known follow-up; the median offset matches what
//! peers will accept today.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// How many peer samples we keep; enough for a stable median without
/// letting late joiners swing it.
const MAX_SAMPLES: usize = 200;

/// The collected peer clock offsets and the median-adjusted clock.
#[derive(Debug, Default)]
pub struct NetworkTime {
    offsets: Vec<i64>,
}

impl NetworkTime {
    pub fn new() -> NetworkTime {
        NetworkTime::default()
    }

    /// Record one peer's reported clock offset, in seconds.
    pub fn add_sample(&mut self, offset_seconds: i64) {
        if self.offsets.len() >= MAX_SAMPLES {
            return;
        }
        self.offsets.push(offset_seconds);
        debug!(
            offset_seconds,
            samples = self.offsets.len(),
            median = self.median_offset(),
            "peer time sample"
        );
    }

    /// The current median offset, in seconds.
    pub fn median_offset(&self) -> i64 {
        if self.offsets.is_empty() {
            return 0;
        }
        let mut sorted = self.offsets.clone();
        sorted.sort_unstable();
        sorted[sorted.len() / 2]
    }

    /// The local clock shifted by the median peer offset.
    pub fn adjusted_now(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.median_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sample_set_means_no_adjustment() {
        let time = NetworkTime::new();
        assert_eq!(time.median_offset(), 0);
    }

    #[test]
    fn median_resists_outliers() {
        let mut time = NetworkTime::new();
        for &offset in &[1, 2, 3, 2, 100_000] {
            time.add_sample(offset);
        }
        assert_eq!(time.median_offset(), 2);
    }

    #[test]
    fn sample_set_is_bounded() {
        let mut time = NetworkTime::new();
        for i in 0..(MAX_SAMPLES as i64 + 50) {
            time.add_sample(i);
        }
        assert_eq!(time.median_offset(), MAX_SAMPLES as i64 / 2);
    }
}
