//! Two-decimal percentage helpers shared by cache entries and ranking rows.

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator * 100`, rounded to two decimals. A zero denominator yields 0.
pub fn percentage(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round2(f64::from(numerator) / f64::from(denominator) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_rather_than_truncates() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(3, 3), 100.0);
    }

    #[test]
    fn zero_denominator_is_zero() {
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn may_exceed_one_hundred() {
        assert_eq!(percentage(15, 10), 150.0);
    }
}
