//! Clock tool: current local date and time.

use std::fmt::Write;

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use relayclaw_core::error::ToolError;
use relayclaw_core::schema::{ObjectSchema, SchemaType};
use relayclaw_core::tool::Tool;

/// Default rendering, e.g. `2026-10-17 14:03:09 Saturday`.
pub const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S %A";

pub struct ClockTool;

/// Render `now` with a strftime pattern, rejecting invalid patterns.
fn render<Tz: chrono::TimeZone>(now: &chrono::DateTime<Tz>, format: &str) -> Result<String, ToolError>
where
    Tz::Offset: std::fmt::Display,
{
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        return Err(ToolError::InvalidArguments(format!(
            "invalid format string '{format}'"
        )));
    }

    let mut out = String::new();
    write!(out, "{}", now.format_with_items(items.iter()))
        .map_err(|_| ToolError::InvalidArguments(format!("invalid format string '{format}'")))?;
    Ok(out)
}

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "clock_current"
    }

    fn description(&self) -> &str {
        "Get the current date and time."
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new().optional_property(
            "format",
            SchemaType::string(
                "Optional strftime format string (e.g. '%Y-%m-%d %H:%M'). Defaults to date, time and weekday.",
            ),
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let format = match arguments.get("format") {
            None | Some(serde_json::Value::Null) => DEFAULT_FORMAT,
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => DEFAULT_FORMAT,
            Some(serde_json::Value::String(s)) => s.as_str(),
            Some(_) => {
                return Err(ToolError::InvalidArguments("'format' must be a string".into()));
            }
        };

        render(&chrono::Local::now(), format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_format_includes_weekday() {
        let now = chrono::Utc.with_ymd_and_hms(2026, 10, 17, 14, 3, 9).unwrap();
        assert_eq!(render(&now, DEFAULT_FORMAT).unwrap(), "2026-10-17 14:03:09 Saturday");
    }

    #[test]
    fn custom_format() {
        let now = chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(render(&now, "%H:%M").unwrap(), "03:04");
    }

    #[test]
    fn invalid_format_rejected() {
        let now = chrono::Utc::now();
        assert!(matches!(
            render(&now, "%Q"),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn execute_without_arguments() {
        let out = ClockTool.execute(serde_json::json!({})).await.unwrap();
        // YYYY-MM-DD HH:MM:SS Weekday
        assert!(out.len() > 20);
        assert_eq!(&out[4..5], "-");
    }

    #[tokio::test]
    async fn non_string_format_rejected() {
        let err = ClockTool.execute(serde_json::json!({"format": 5})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
