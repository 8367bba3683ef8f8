//! Server and resource naming rules

use crate::error::CoreError;

/// Check that a server name is a valid hostname.
///
/// Labels are alphanumeric plus hyphens, at most 63 characters, and may
/// not start or end with a hyphen; the whole name is capped at 255.
#[must_use]
pub fn is_valid_server_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 255 {
        return false;
    }
    let name = name.strip_suffix('.').unwrap_or(name);

    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Validate a server name, carrying the rejected name in the error
///
/// # Errors
/// Returns `CoreError::InvalidServerName` when the name fails the
/// hostname rules of [`is_valid_server_name`].
pub fn validate_server_name(name: &str) -> Result<(), CoreError> {
    if is_valid_server_name(name) {
        Ok(())
    } else {
        Err(CoreError::InvalidServerName(name.to_string()))
    }
}

/// Derive a related resource name (firewall, key pair) from a server name.
///
/// Lowercases and replaces every non-alphanumeric character with a hyphen
/// before appending the suffix, e.g. `My.Node` + `-fw` -> `my-node-fw`.
#[must_use]
pub fn derive_resource_name(server_name: &str, suffix: &str) -> String {
    let mut base: String = server_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    base.push_str(suffix);
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_names() {
        assert!(is_valid_server_name("node-1"));
        assert!(is_valid_server_name("my.node.example"));
        assert!(is_valid_server_name("trailing.dot."));
    }

    #[test]
    fn rejects_bad_names() {
        assert!(!is_valid_server_name(""));
        assert!(!is_valid_server_name("-leading"));
        assert!(!is_valid_server_name("trailing-"));
        assert!(!is_valid_server_name("under_score"));
        assert!(!is_valid_server_name(&"x".repeat(256)));
        assert!(!is_valid_server_name("double..dot"));
    }

    #[test]
    fn validation_error_carries_the_name() {
        assert!(validate_server_name("node-1").is_ok());

        let err = validate_server_name("bad_name").unwrap_err();
        assert!(matches!(err, CoreError::InvalidServerName(name) if name == "bad_name"));
    }

    #[test]
    fn derives_firewall_and_key_names() {
        assert_eq!(derive_resource_name("My Node", "-fw"), "my-node-fw");
        assert_eq!(derive_resource_name("dag.node", "-ssh"), "dag-node-ssh");
    }
}
