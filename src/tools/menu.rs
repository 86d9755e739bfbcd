//! Lunch menus from a small static table.

use serde_json::Value;

use crate::mcp::schema::{CallArguments, ParamSpec, ParamType, ToolSchema, DATE_FORMAT};

/// Tool name.
pub const NAME: &str = "lunch_menu";

/// Tool description.
pub const DESCRIPTION: &str = "Return lunch menu for a given date.";

/// Returned for dates without a menu.
pub const NO_MENU: &str = "No menu available for that date.";

const MENUS: &[(&str, &str)] = &[
    ("2025-11-07", "Cheese Pizza, Garden Salad, Apple Slices, Milk"),
    ("2025-11-08", "Chicken Nuggets, Mashed Potatoes, Green Beans"),
    ("2025-11-09", "Veggie Burger, Sweet Potato Fries, Orange Wedges"),
];

/// Argument schema: `date`, required.
#[must_use]
pub fn schema() -> ToolSchema {
    ToolSchema::new().param(ParamSpec::required(
        "date",
        ParamType::Date,
        "Date in YYYY-MM-DD format",
    ))
}

/// Looks up the menu for a date; unknown dates get [`NO_MENU`].
#[must_use]
pub fn lunch_menu(date: &str) -> &'static str {
    MENUS
        .iter()
        .find(|(day, _)| *day == date)
        .map_or(NO_MENU, |(_, menu)| menu)
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
    Ok(Value::from(lunch_menu(&date)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_dates() {
        assert_eq!(
            lunch_menu("2025-11-07"),
            "Cheese Pizza, Garden Salad, Apple Slices, Milk"
        );
        assert_eq!(
            lunch_menu("2025-11-09"),
            "Veggie Burger, Sweet Potato Fries, Orange Wedges"
        );
    }

    #[test]
    fn unknown_date_is_not_an_error() {
        assert_eq!(lunch_menu("2099-01-01"), NO_MENU);
    }
}
