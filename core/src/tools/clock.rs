use crate::traits::Tool;
use chrono::format::{Item, StrftimeItems};
use serde_json::Value;

const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S (%A)";

pub struct ClockTool;

impl Tool for ClockTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current local date and time. Input: optional strftime format, e.g. \"%H:%M\""
    }

    fn call(&self, input: &str) -> anyhow::Result<Value> {
        let format = match input.trim() {
            "" => DEFAULT_FORMAT,
            custom => custom,
        };

        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            anyhow::bail!("Invalid time format '{}'", format);
        }

        Ok(Value::String(chrono::Local::now().format(format).to_string()))
    }
}
