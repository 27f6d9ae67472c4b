//! Pure bucket-alignment and percentile math.
//!
//! Nothing here touches the store or the clock — these are the two formulas
//! the rest of the pipeline must agree on bit-for-bit, so they live in
//! isolation and are exhaustively unit tested.

use chrono::{DateTime, TimeZone, Utc};

/// A bucket width the aggregator rolls observations up into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketWidth {
    /// One minute.
    OneMinute,
    /// Five minutes.
    FiveMinutes,
    /// One hour.
    OneHour,
}

impl BucketWidth {
    /// All widths a single observation is ever rolled up into.
    pub const ALL: [BucketWidth; 3] = [
        BucketWidth::OneMinute,
        BucketWidth::FiveMinutes,
        BucketWidth::OneHour,
    ];

    /// The width in whole seconds.
    pub fn as_secs(self) -> i64 {
        match self {
            BucketWidth::OneMinute => 60,
            BucketWidth::FiveMinutes => 300,
            BucketWidth::OneHour => 3600,
        }
    }

    /// Parse a width from its wire/storage representation (`"1m"`, `"5m"`, `"1h"`).
    pub fn from_code(code: &str) -> Option<BucketWidth> {
        match code {
            "1m" => Some(BucketWidth::OneMinute),
            "5m" => Some(BucketWidth::FiveMinutes),
            "1h" => Some(BucketWidth::OneHour),
            _ => None,
        }
    }

    /// The wire/storage representation of this width.
    pub fn code(self) -> &'static str {
        match self {
            BucketWidth::OneMinute => "1m",
            BucketWidth::FiveMinutes => "5m",
            BucketWidth::OneHour => "1h",
        }
    }
}

impl serde::Serialize for BucketWidth {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

/// Align `ts` down to the start of the bucket of width `width` that contains it.
///
/// `n = floor(ts_epoch_seconds / width_seconds)`; the bucket start is
/// `n * width_seconds`. All arithmetic happens in UTC epoch seconds — no
/// local time, no DST.
pub fn align(ts: DateTime<Utc>, width: BucketWidth) -> DateTime<Utc> {
    let width_secs = width.as_secs();
    let epoch_secs = ts.timestamp();
    let n = epoch_secs.div_euclid(width_secs);
    Utc.timestamp_opt(n * width_secs, 0)
        .single()
        .expect("bucket start is always a representable instant")
}

/// Compute the 95th-percentile latency using the nearest-rank variant with a
/// −1 offset: `i = floor(len * 0.95) - 1`, clamped to zero.
///
/// `latencies` need not be sorted on entry. Returns `0` for an empty slice.
pub fn p95(latencies: &[i64]) -> i64 {
    if latencies.is_empty() {
        return 0;
    }
    let mut sorted = latencies.to_vec();
    sorted.sort_unstable();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let i = ((sorted.len() as f64 * 0.95).floor() as usize).saturating_sub(1);
    sorted[i]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn align_one_minute() {
        let t = ts("2024-01-01T00:00:30Z");
        assert_eq!(align(t, BucketWidth::OneMinute), ts("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn align_five_minutes() {
        let t = ts("2024-01-01T00:07:59Z");
        assert_eq!(
            align(t, BucketWidth::FiveMinutes),
            ts("2024-01-01T00:05:00Z")
        );
    }

    #[test]
    fn align_one_hour() {
        let t = ts("2024-01-01T13:59:59Z");
        assert_eq!(align(t, BucketWidth::OneHour), ts("2024-01-01T13:00:00Z"));
    }

    #[test]
    fn align_on_exact_boundary_is_identity() {
        let t = Utc.timestamp_opt(3600, 0).single().unwrap();
        assert_eq!(align(t, BucketWidth::OneHour), t);
    }

    #[test]
    fn p95_empty_is_zero() {
        assert_eq!(p95(&[]), 0);
    }

    #[test]
    fn p95_offset_rule_twenty_samples() {
        let latencies: Vec<i64> = (1..=20).collect();
        // floor(20 * 0.95) - 1 = 18, latencies[18] == 19
        assert_eq!(p95(&latencies), 19);
    }

    #[test]
    fn p95_unsorted_input() {
        let latencies = vec![5, 1, 4, 2, 3];
        assert_eq!(p95(&latencies), 5);
    }

    #[test]
    fn p95_single_sample() {
        assert_eq!(p95(&[42]), 42);
    }

    #[test]
    fn bucket_width_codes_round_trip() {
        for w in BucketWidth::ALL {
            assert_eq!(BucketWidth::from_code(w.code()), Some(w));
        }
    }
}
