/// Format milliseconds as "M:SS.mmm" for lap times
pub fn format_lap_time(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{}:{:02}.{:03}", minutes, seconds, millis)
}

/// Format milliseconds as "MM:SS" for the race countdown
pub fn format_countdown(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
