//! Rate normalization for partially accumulated buckets.

/// Extrapolate a partial-minute observation to a full-minute rate.
///
/// A bucket is read mid-accumulation, so `count` events seen over
/// `elapsed_seconds` scale to `count * 60 / elapsed_seconds` events per
/// minute. Integer arithmetic with floor truncation: the detector compares
/// against integer thresholds, and truncating rounds toward *fewer* alerts,
/// so a borderline rate never fires on a rounding artifact.
///
/// `elapsed_seconds` is clamped to at least 1, covering a bucket read within
/// the same second it opened.
pub fn normalized_rate(count: u64, elapsed_seconds: u64) -> u64 {
    let elapsed = elapsed_seconds.max(1);
    count.saturating_mul(60) / elapsed
}
