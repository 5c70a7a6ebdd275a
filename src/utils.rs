use chrono::{Local, TimeZone, Utc};

/// Current wall clock as Unix milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// 将毫秒时间戳格式化为本地时间 HH:MM:SS.mmm
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(time) => time.format("%H:%M:%S%.3f").to_string(),
        None => format!("Invalid timestamp: {}", timestamp_ms),
    }
}

/// Age of a reading relative to now, in milliseconds. Never negative.
pub fn age_ms(timestamp_ms: i64) -> i64 {
    (current_timestamp_ms() - timestamp_ms).max(0)
}
