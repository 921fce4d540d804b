// src/config/duration.rs

use std::time::Duration;

/// Parse a duration like `"250ms"`, `"30s"`, `"15m"` or `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, h or d",
                unit
            ));
        }
    };
    let secs = value
        .checked_mul(secs_per_unit)
        .ok_or_else(|| format!("duration '{s}' is too large"))?;
    // chrono::Duration tops out at i64::MAX milliseconds.
    if secs > MAX_SECS {
        return Err(format!("duration '{s}' is too large"));
    }
    Ok(Duration::from_secs(secs))
}

/// Largest duration accepted, in seconds (about 292 million years).
const MAX_SECS: u64 = i64::MAX as u64 / 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration(" 10m "), Ok(Duration::from_secs(600)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_duration("1d"), Ok(Duration::from_secs(86_400)));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("m15").is_err());
        assert!(parse_duration("5 weeks").is_err());
    }

    #[test]
    fn rejects_values_that_overflow() {
        let err = parse_duration("18446744073709551615d").unwrap_err();
        assert!(err.contains("too large"), "{err}");
        assert!(parse_duration("9223372036854776s").is_err());
        assert_eq!(
            parse_duration("9223372036854s"),
            Ok(Duration::from_secs(9_223_372_036_854))
        );
    }
}
