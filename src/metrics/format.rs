//! Human-readable renderings of durations and percentages.

/// `45m`, `5h`, `2d`, `2d 3h`.
pub fn format_duration(hours: f64) -> String {
    if hours < 1.0 {
        format!("{}m", (hours * 60.0).round() as i64)
    } else if hours < 24.0 {
        format!("{}h", hours.round() as i64)
    } else {
        let days = (hours / 24.0).floor() as i64;
        let remaining = (hours % 24.0).round() as i64;
        if remaining > 0 {
            format!("{days}d {remaining}h")
        } else {
            format!("{days}d")
        }
    }
}

/// Rounded to at most two decimals, trailing zeros dropped.
pub fn format_percentage(value: f64) -> String {
    format!("{}%", round2(value))
}

/// Like [`format_percentage`] but always signed.
pub fn format_growth(value: f64) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{sign}{}%", round2(value))
}

fn round2(value: f64) -> f64 {
    let r = (value * 100.0).round() / 100.0;
    // Avoid printing "-0"
    if r == 0.0 {
        0.0
    } else {
        r
    }
}
