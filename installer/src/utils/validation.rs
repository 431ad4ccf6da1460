// Input validation utilities

use anyhow::Result;
use regex::Regex;

/// Validate database name (PostgreSQL)
pub fn validate_postgres_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow::anyhow!("Database name cannot be empty"));
    }

    // NAMEDATALEN - 1, in bytes
    if name.len() > 63 {
        return Err(anyhow::anyhow!("Database name cannot exceed 63 characters"));
    }

    if name.contains('\0') {
        return Err(anyhow::anyhow!("Database name cannot contain null bytes"));
    }

    Ok(())
}

/// Application names become a directory under the projects and state folders.
pub fn validate_application_name(name: &str) -> Result<()> {
    let s = name.trim();
    if s.is_empty() {
        return Err(anyhow::anyhow!("Application name is required"));
    }

    if s == "." || s == ".." || s.contains(['/', '\\', '\0']) {
        return Err(anyhow::anyhow!(
            "Application name '{}' must not contain path separators",
            name
        ));
    }

    Ok(())
}

/// Parameter names used in `${name}` placeholders and `--set name=value`.
pub fn validate_parameter_name(name: &str) -> Result<()> {
    let ident_re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").map_err(|e| {
        anyhow::anyhow!("Internal error: failed to compile identifier regex: {}", e)
    })?;

    if !ident_re.is_match(name) {
        return Err(anyhow::anyhow!(
            "Invalid parameter name '{}' (letters, digits, '_', '.', '-'; must not start with a digit)",
            name
        ));
    }

    Ok(())
}
