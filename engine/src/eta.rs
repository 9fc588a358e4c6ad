//! Sliding-window admission rate and ETA estimation (component H.4).
//!
//! Builds on [`waitline_store::admission_counter`]'s raw window counts: this
//! module owns the weighting, the hourly traffic profile, and the ETA/
//! confidence formulas. The store layer only knows how to count; it has no
//! opinion on how those counts turn into a wait estimate.

/// One window's weight in the blended rate estimate.
struct Window {
    seconds: i64,
    weight: f64,
}

const WINDOWS: [Window; 3] = [
    Window { seconds: 60, weight: 0.5 },
    Window { seconds: 300, weight: 0.3 },
    Window { seconds: 900, weight: 0.2 },
];

/// Hourly traffic-profile multipliers, hour 0..23 in the event's configured
/// time zone. Off-peak hours are suppressed, evening peak amplified. Flat
/// for every event; whether this should become event-configurable is an
/// open question (see the design notes).
pub const HOURLY_TRAFFIC_PROFILE: [f64; 24] = [
    0.2, 0.2, 0.2, 0.2, 0.2, 0.2, // 00:00-05:59 off-peak
    0.4, 0.6, 0.8, 1.0, 1.0, 1.0, // 06:00-11:59 ramp-up
    1.0, 1.0, 1.0, 1.0, 1.2, 1.5, // 12:00-17:59 daytime
    2.0, 2.0, 1.8, 1.5, 1.0, 0.4, // 18:00-23:59 evening peak, taper
];

/// Minimum and maximum ETA, in seconds, regardless of position.
pub const MIN_ETA_SECS: u64 = 1;
pub const MAX_ETA_SECS: u64 = 600;

/// Counts of admissions in each of the three windows, supplied by the
/// caller from [`waitline_store::admission_counter::count_in_window`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowCounts {
    pub last_1min: u64,
    pub last_5min: u64,
    pub last_15min: u64,
}

/// Estimated time-to-entry plus a confidence score in `[0.2, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtaEstimate {
    /// Seconds until this position is expected to be admitted.
    pub eta_secs: u64,
    /// Confidence in the estimate, `[0.2, 1.0]`.
    pub confidence: f64,
}

/// Computes a weighted admission rate (admissions/sec) from window counts,
/// then applies the hourly traffic-profile multiplier for `hour_of_day`
/// (0..23).
#[must_use]
pub fn adjusted_rate(counts: WindowCounts, hour_of_day: usize) -> f64 {
    let raw_counts = [counts.last_1min, counts.last_5min, counts.last_15min];
    let weighted_rate: f64 = WINDOWS
        .iter()
        .zip(raw_counts)
        .map(|(w, count)| {
            #[allow(clippy::cast_precision_loss)]
            let rate = count as f64 / w.seconds as f64;
            rate * w.weight
        })
        .sum();

    let profile = HOURLY_TRAFFIC_PROFILE
        .get(hour_of_day % 24)
        .copied()
        .unwrap_or(1.0);

    weighted_rate * profile
}

/// Confidence score from sample density.
#[must_use]
pub fn confidence(counts: WindowCounts) -> f64 {
    if counts.last_15min >= 30 {
        1.0
    } else if counts.last_5min >= 10 {
        0.8
    } else if counts.last_1min >= 3 {
        0.6
    } else if counts.last_1min > 0 || counts.last_5min > 0 || counts.last_15min > 0 {
        0.4
    } else {
        0.2
    }
}

/// Computes the full ETA estimate for a given `position` (1-based).
#[must_use]
pub fn estimate(position: u64, counts: WindowCounts, hour_of_day: usize) -> EtaEstimate {
    let rate = adjusted_rate(counts, hour_of_day);

    #[allow(clippy::cast_precision_loss)]
    let eta_secs = if rate <= 0.0 {
        tracing::warn!(position, "admission rate is zero; falling back to 2x position heuristic");
        2 * position
    } else {
        let raw = (position as f64 / rate * 1.1).ceil();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let raw_secs = raw as u64;
        raw_secs
    };

    EtaEstimate {
        eta_secs: eta_secs.clamp(MIN_ETA_SECS, MAX_ETA_SECS),
        confidence: confidence(counts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_falls_back_to_double_position() {
        let estimate = estimate(50, WindowCounts::default(), 12);
        assert_eq!(estimate.eta_secs, 100);
        assert!((estimate.confidence - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_eta_clamped_to_minimum() {
        let counts = WindowCounts {
            last_1min: 1000,
            last_5min: 5000,
            last_15min: 15000,
        };
        let estimate = estimate(1, counts, 12);
        assert_eq!(estimate.eta_secs, MIN_ETA_SECS);
    }

    #[test]
    fn test_eta_clamped_to_maximum() {
        let counts = WindowCounts {
            last_1min: 1,
            last_5min: 1,
            last_15min: 1,
        };
        let estimate = estimate(100_000, counts, 3); // off-peak hour, low rate
        assert_eq!(estimate.eta_secs, MAX_ETA_SECS);
    }

    #[test]
    fn test_confidence_thresholds() {
        assert!((confidence(WindowCounts { last_15min: 30, ..Default::default() }) - 1.0).abs() < f64::EPSILON);
        assert!((confidence(WindowCounts { last_5min: 10, ..Default::default() }) - 0.8).abs() < f64::EPSILON);
        assert!((confidence(WindowCounts { last_1min: 3, ..Default::default() }) - 0.6).abs() < f64::EPSILON);
        assert!((confidence(WindowCounts { last_1min: 1, ..Default::default() }) - 0.4).abs() < f64::EPSILON);
        assert!((confidence(WindowCounts::default()) - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_evening_peak_multiplier_exceeds_off_peak() {
        let counts = WindowCounts { last_1min: 10, last_5min: 50, last_15min: 150 };
        let off_peak = adjusted_rate(counts, 2);
        let evening_peak = adjusted_rate(counts, 18);
        assert!(evening_peak > off_peak);
    }
}
