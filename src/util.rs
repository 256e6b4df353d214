use std::time::{SystemTime, UNIX_EPOCH};

/// Strip everything but alphanumerics from a transport-supplied user id so it
/// is safe as a storage key and prompt insert.
pub(crate) fn sanitize_user_id(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

pub(crate) fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub(crate) fn jitter_ratio() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

/// Current time rendered for summaries and the get_current_time tool
/// (US Central, the bot's home timezone).
pub(crate) fn current_time_string() -> String {
    use chrono::{FixedOffset, Utc};
    // CST is UTC-6; close enough for a chatbot that ignores DST on purpose.
    let central = FixedOffset::west_opt(6 * 3600).unwrap_or_else(|| FixedOffset::west_opt(0).unwrap());
    Utc::now()
        .with_timezone(&central)
        .format("%Y-%m-%d %H:%M:%S (US Central)")
        .to_string()
}
