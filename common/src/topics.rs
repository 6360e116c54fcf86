pub const TOPIC_TELEGRAM_IN: &str = "telegram/in";
pub const TOPIC_TELEGRAM_OUT: &str = "telegram/out";
pub const TOPIC_READ_REQUEST: &str = "read";

pub fn topic(prefix: &str, suffix: &str) -> String {
    format!("{prefix}/{suffix}")
}

pub fn climate_state_topic(prefix: &str, name: &str) -> String {
    // MQTT wildcards and separators are not allowed inside a topic level.
    let level: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '+' | '#') { '_' } else { c })
        .collect();
    format!("{prefix}/climate/{level}/state")
}
