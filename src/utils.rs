/// Round to two decimal places, the precision every converted metric is reported with.
///
/// # Examples
///
/// ```
/// use cpe_monitor::utils::round2;
///
/// assert_eq!(round2(1.004_9), 1.0);
/// assert_eq!(round2(0.126), 0.13);
/// ```
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert!((round2(1.0) - 1.0).abs() < f64::EPSILON);
        assert!((round2(0.125_1) - 0.13).abs() < f64::EPSILON);
        assert!((round2(-3.333) + 3.33).abs() < f64::EPSILON);
        assert!((round2(150.0) - 150.0).abs() < f64::EPSILON);
    }
}
