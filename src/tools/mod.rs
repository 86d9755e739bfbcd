//! The built-in school tools.
//!
//! - [`absence`]: `report_absence(date, reason)`
//! - [`menu`]: `lunch_menu(date)`

pub mod absence;
pub mod menu;

use std::sync::Arc;

use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::registry::{RegistryError, ToolListing, ToolRegistry};

/// Registers every built-in tool.
///
/// # Errors
///
/// Returns an error if a built-in name is already taken in `registry`.
pub fn register_builtins(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(
        absence::NAME,
        absence::DESCRIPTION,
        absence::schema(),
        absence::handle,
    )?;
    registry.register(menu::NAME, menu::DESCRIPTION, menu::schema(), menu::handle)?;
    Ok(())
}

/// Builds a registry holding only the built-in tools.
///
/// # Errors
///
/// Propagates registration failures.
pub fn builtin_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry)?;
    Ok(registry)
}

/// Builds a dispatcher over the built-in tools.
///
/// # Errors
///
/// Propagates registration failures.
pub fn builtin_dispatcher() -> Result<Dispatcher, RegistryError> {
    Ok(Dispatcher::new(Arc::new(builtin_registry()?)))
}

/// The public listing of the built-in tools, without building handlers.
#[must_use]
pub fn builtin_listing() -> Vec<ToolListing> {
    vec![
        ToolListing {
            name: absence::NAME.to_string(),
            description: absence::DESCRIPTION.to_string(),
            schema: absence::schema(),
        },
        ToolListing {
            name: menu::NAME.to_string(),
            description: menu::DESCRIPTION.to_string(),
            schema: menu::schema(),
        },
    ]
}
