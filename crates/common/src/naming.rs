//! DNS-safe service names
//!
//! Service names double as the deployment target name on the runtime
//! platform, so they are restricted to lowercase alphanumerics and hyphens.

use crate::error::{Error, Result};
use uuid::Uuid;

/// Maximum length of a service name
pub const MAX_SERVICE_NAME_LEN: usize = 50;

/// Length of the id suffix appended to provisional names
const SUFFIX_LEN: usize = 8;

/// Turn arbitrary text into a DNS-safe service name
///
/// Lowercases the input, replaces every character outside `[a-z0-9-]`
/// with a hyphen, collapses hyphen runs and trims hyphens from both ends
/// before and after truncating to [`MAX_SERVICE_NAME_LEN`]. The result may
/// be empty when the input contains no usable characters.
pub fn sanitize_service_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }

    truncate_name(&out, MAX_SERVICE_NAME_LEN)
}

/// Provisional name assigned at intake, before a spec has been inferred
///
/// Built from the prompt plus a short slice of the record id so that two
/// identical prompts do not collide.
pub fn provisional_name(prompt: &str, id: &Uuid) -> String {
    let suffix: String = id.simple().to_string().chars().take(SUFFIX_LEN).collect();
    let prefix = truncate_name(
        &sanitize_service_name(prompt),
        MAX_SERVICE_NAME_LEN - SUFFIX_LEN - 1,
    );

    if prefix.is_empty() {
        format!("svc-{}", suffix)
    } else {
        format!("{}-{}", prefix, suffix)
    }
}

/// Check that a name already satisfies the service name rules
pub fn validate_service_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("service name cannot be empty".to_string()));
    }

    if name.len() > MAX_SERVICE_NAME_LEN {
        return Err(Error::Validation(format!(
            "service name '{}' exceeds {} characters",
            name, MAX_SERVICE_NAME_LEN
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(Error::Validation(format!(
            "service name '{}' may only contain lowercase letters, digits and hyphens",
            name
        )));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(Error::Validation(format!(
            "service name '{}' cannot start or end with a hyphen",
            name
        )));
    }

    Ok(())
}

fn truncate_name(name: &str, max: usize) -> String {
    let truncated: String = name.chars().take(max).collect();
    truncated.trim_matches('-').to_string()
}
