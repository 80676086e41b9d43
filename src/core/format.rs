//! Human-readable units for the display fields on task records.

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec <= 0.0 {
        return "0 B/s".to_string();
    }
    format!("{}/s", format_bytes(bytes_per_sec as u64))
}

pub fn format_eta(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "unknown".to_string();
    }

    let total = seconds.round() as u64;
    if total < 60 {
        return format!("{total}s");
    }

    let minutes = total / 60;
    let secs = total % 60;
    if minutes < 60 {
        return format!("{minutes}m {secs:02}s");
    }

    let hours = minutes / 60;
    let mins = minutes % 60;
    format!("{hours}h {mins:02}m")
}
