//! Clock-style time parsing

use crate::error::{ConvertError, ConvertResult};

/// Parse `HH:MM:SS[.fraction]` into seconds.
///
/// Hours may exceed two digits; minutes and seconds are taken as given.
pub fn parse_clock(time_str: &str) -> ConvertResult<f64> {
    let time_str = time_str.trim();
    let invalid = || {
        ConvertError::invalid_setting(format!(
            "Invalid time '{}'. Expected HH:MM:SS[.fff]",
            time_str
        ))
    };

    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].parse().map_err(|_| invalid())?;
    let seconds: f64 = parts[2].parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("00:00:04.00").unwrap(), 4.0);
        assert_eq!(parse_clock("01:02:03").unwrap(), 3723.0);
        assert!((parse_clock("00:01:30.5").unwrap() - 90.5).abs() < 1e-9);
        assert_eq!(parse_clock("100:00:00").unwrap(), 360000.0);
    }

    #[test]
    fn test_parse_clock_rejects_garbage() {
        assert!(parse_clock("").is_err());
        assert!(parse_clock("12:34").is_err());
        assert!(parse_clock("aa:00:00").is_err());
        assert!(parse_clock("00:00:-1").is_err());
        assert!(parse_clock("N/A").is_err());
    }
}
