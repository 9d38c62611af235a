/// Renders seconds as `H:MM`, dropping any partial minute.
///
/// Hours are never padded, so ten hours renders as `10:00` and one hour as
/// `1:00`. This is the format stored in every weekly ledger slot.
pub fn format_clock(seconds: u64) -> String {
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let minutes = minutes - hours * 60;
    format!("{hours}:{minutes:02}")
}

/// Renders seconds as `M:SS` for the live display of a running timer.
pub fn format_running(seconds: u64) -> String {
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    format!("{minutes}:{seconds:02}")
}

/// Parses user time input.
///
/// Accepts `mm:ss` (seconds below 60) or a bare number of minutes. Anything
/// else yields `None`.
pub fn parse_time_input(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match text.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes = parse_digits(minutes)?;
            let seconds = parse_digits(seconds)?;
            if seconds >= 60 {
                return None;
            }
            minutes.checked_mul(60)?.checked_add(seconds)
        }
        None => parse_digits(text)?.checked_mul(60),
    }
}

/// Parses an `H:MM` ledger component back into seconds.
///
/// Malformed components count as zero.
pub fn parse_clock(text: &str) -> u64 {
    let Some((hours, minutes)) = text.trim().split_once(':') else {
        return 0;
    };
    match (parse_digits(hours), parse_digits(minutes)) {
        (Some(hours), Some(minutes)) => hours
            .saturating_mul(3600)
            .saturating_add(minutes.saturating_mul(60)),
        _ => 0,
    }
}

fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::{format_clock, format_running, parse_clock, parse_time_input};

    #[test]
    fn clock_truncates_partial_minutes() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(59), "0:00");
        assert_eq!(format_clock(3661), "1:01");
        assert_eq!(format_clock(36_000), "10:00");
    }

    #[test]
    fn running_display_pads_seconds_only() {
        assert_eq!(format_running(125), "2:05");
        assert_eq!(format_running(0), "0:00");
        assert_eq!(format_running(3600), "60:00");
    }

    #[test]
    fn parses_minutes_and_seconds() {
        assert_eq!(parse_time_input("12:30"), Some(750));
        assert_eq!(parse_time_input("45"), Some(2700));
        assert_eq!(parse_time_input(" 0:59 "), Some(59));
    }

    #[test]
    fn rejects_malformed_time_input() {
        assert_eq!(parse_time_input("12:75"), None);
        assert_eq!(parse_time_input(""), None);
        assert_eq!(parse_time_input("abc"), None);
        assert_eq!(parse_time_input("1:2:3"), None);
        assert_eq!(parse_time_input(":30"), None);
        assert_eq!(parse_time_input("-5"), None);
        assert_eq!(parse_time_input("99999999999999999999"), None);
    }

    #[test]
    fn ledger_components_parse_back_to_seconds() {
        assert_eq!(parse_clock("1:05"), 3900);
        assert_eq!(parse_clock("0:00"), 0);
        assert_eq!(parse_clock("garbage"), 0);
        assert_eq!(parse_clock(""), 0);
    }
}
