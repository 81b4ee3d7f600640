fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Human text for a duration in minutes: seconds under a minute, whole minutes
/// under an hour, hours and minutes beyond that. Partial units are truncated.
pub fn format_minutes(minutes: f64) -> String {
    if !minutes.is_finite() || minutes <= 0.0 {
        return plural(0, "second");
    }

    if minutes < 1.0 {
        return plural((minutes * 60.0) as u64, "second");
    }

    let whole_minutes = minutes as u64;
    if whole_minutes < 60 {
        return plural(whole_minutes, "minute");
    }

    let hours = whole_minutes / 60;
    let rest = whole_minutes % 60;
    if rest == 0 {
        plural(hours, "hour")
    } else {
        format!("{} {}", plural(hours, "hour"), plural(rest, "minute"))
    }
}
