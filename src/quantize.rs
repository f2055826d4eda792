//! Maps a source location in `[0, 1)` to an integer bucket in `[0, B)`
//! (spec §2 "Quantizer", §4.3). Wired into admission via
//! [`crate::seed::Seed::from_raw_location`] for collaborators that hand the
//! scheduler a raw real instead of an already-quantized bucket.

/// Quantizes `location` (expected in `[0, 1)`) into a bucket index in
/// `[0, interval_size)`. Values outside `[0, 1)` are clamped rather than
/// wrapped, since a malformed location from an external collaborator
/// should degrade to an edge bucket, not silently alias an unrelated one.
pub fn quantize(location: f64, interval_size: u32) -> u32 {
    let clamped = if location.is_nan() {
        0.0
    } else {
        location.clamp(0.0, 0.999_999_999_999)
    };
    let scaled = clamped * f64::from(interval_size);
    (scaled as u32).min(interval_size.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_maps_to_bucket_zero() {
        assert_eq!(quantize(0.0, 1024), 0);
    }

    #[test]
    fn just_under_one_maps_to_last_bucket() {
        assert_eq!(quantize(0.999_999, 1024), 1023);
    }

    #[test]
    fn midpoint_maps_to_middle_bucket() {
        assert_eq!(quantize(0.5, 1024), 512);
    }

    #[test]
    fn out_of_range_values_clamp_instead_of_wrap() {
        assert_eq!(quantize(1.5, 1024), 1023);
        assert_eq!(quantize(-1.0, 1024), 0);
    }
}
