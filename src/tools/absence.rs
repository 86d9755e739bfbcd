//! Absence reporting.

use serde_json::Value;

use crate::mcp::schema::{CallArguments, ParamSpec, ParamType, ToolSchema, DATE_FORMAT};

/// Tool name.
pub const NAME: &str = "report_absence";

/// Tool description.
pub const DESCRIPTION: &str = "Report an absence on a specific date for a specific reason.";

/// Argument schema: `date` and `reason`, both required.
#[must_use]
pub fn schema() -> ToolSchema {
    ToolSchema::new()
        .param(ParamSpec::required(
            "date",
            ParamType::Date,
            "Date in YYYY-MM-DD format",
        ))
        .param(ParamSpec::required(
            "reason",
            ParamType::String,
            "Reason for absence",
        ))
}

/// Builds the confirmation for an absence.
#[must_use]
pub fn report_absence(date: &str, reason: &str) -> String {
    format!("Absence reported for {date}. Reason: {reason}")
}

/// Handler registered for [`NAME`].
///
/// # Errors
///
/// Fails only if called with arguments that bypassed validation.
pub fn handle(args: &CallArguments) -> Result<Value, String> {
    let date = args
        .date("date")
        .ok_or("date argument missing")?
        .format(DATE_FORMAT)
        .to_string();
    let reason = args.str("reason").ok_or("reason argument missing")?;

    tracing::info!(date = %date, reason = %reason, "Absence reported");
    Ok(Value::from(report_absence(&date, reason)))
}
