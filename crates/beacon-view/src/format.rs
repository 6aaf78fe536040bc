use std::time::Duration;

/// Compact elapsed-time label for a loading indicator.
///
/// `42s` under a minute, `3m 07s` under an hour, `1h 02m` beyond.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "0s");
        assert_eq!(format_elapsed(Duration::from_millis(42_900)), "42s");
        assert_eq!(format_elapsed(Duration::from_secs(60)), "1m 00s");
        assert_eq!(format_elapsed(Duration::from_secs(187)), "3m 07s");
        assert_eq!(format_elapsed(Duration::from_secs(3599)), "59m 59s");
        assert_eq!(format_elapsed(Duration::from_secs(3720)), "1h 02m");
        assert_eq!(format_elapsed(Duration::from_secs(26 * 3600)), "26h 00m");
    }
}
