pub const TOPIC_SENSOR_TEMP: &str = "changeover/temperature";

/// Commands arrive on `changeover/cmnd/<context>`, e.g. `changeover/cmnd/swapTime`.
pub const TOPIC_CMD_PREFIX: &str = "changeover/cmnd/";
pub const TOPIC_CMD_WILDCARD: &str = "changeover/cmnd/+";

pub const TOPIC_MODE: &str = "changeover/mode";
pub const TOPIC_DIAGNOSTICS: &str = "changeover/diagnostics";

pub fn command_context(topic: &str) -> Option<&str> {
    topic
        .strip_prefix(TOPIC_CMD_PREFIX)
        .filter(|context| !context.is_empty() && !context.contains('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_command_context() {
        assert_eq!(command_context("changeover/cmnd/setpoint"), Some("setpoint"));
        assert_eq!(command_context("changeover/cmnd/"), None);
        assert_eq!(command_context("changeover/cmnd/a/b"), None);
        assert_eq!(command_context(TOPIC_SENSOR_TEMP), None);
    }
}
