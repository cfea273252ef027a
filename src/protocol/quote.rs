//! Identifier quoting for generated DDL

use crate::error::{DumpError, Result};

/// Quote a database name as a backtick identifier, doubling embedded backticks
pub fn quote_ident(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(DumpError::InvalidParameter(
            "database name must not be empty".to_string(),
        ));
    }
    if name.contains('\0') {
        return Err(DumpError::InvalidParameter(
            "database name must not contain NUL".to_string(),
        ));
    }
    Ok(format!("`{}`", name.replace('`', "``")))
}
