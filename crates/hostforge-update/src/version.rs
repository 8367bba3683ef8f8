//! Remote version descriptor

use tracing::debug;

use crate::error::UpdateError;

/// Version and expected digest of the reference artifact, sourced from a
/// remote text resource. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDescriptor {
    /// Semantic version string
    pub version: String,
    /// Hex digest of the reference artifact
    pub digest: String,
}

impl VersionDescriptor {
    /// Parse the two-field text form `<version> <hex-digest>`.
    ///
    /// Only the first line is authoritative; anything after it is ignored.
    ///
    /// # Errors
    /// Returns `UpdateError::Descriptor` when the first line does not hold
    /// exactly two fields.
    pub fn parse(text: &str) -> Result<Self, UpdateError> {
        let line = text
            .lines()
            .next()
            .ok_or_else(|| UpdateError::Descriptor("empty resource".to_string()))?;

        let mut fields = line.split_whitespace();
        let version = fields
            .next()
            .ok_or_else(|| UpdateError::Descriptor("missing version field".to_string()))?;
        let digest = fields
            .next()
            .ok_or_else(|| UpdateError::Descriptor("missing digest field".to_string()))?;
        if fields.next().is_some() {
            return Err(UpdateError::Descriptor(format!(
                "expected two fields, got: {line}"
            )));
        }

        Ok(Self {
            version: version.to_string(),
            digest: digest.to_lowercase(),
        })
    }

    /// Fetch and parse the descriptor from `url`.
    ///
    /// # Errors
    /// Returns `UpdateError::Network` on transport failure,
    /// `UpdateError::HttpStatus` on a non-success response, or a parse
    /// error for a malformed body.
    pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Self, UpdateError> {
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(UpdateError::HttpStatus(response.status().as_u16()));
        }
        let body = response.text().await?;
        let descriptor = Self::parse(&body)?;
        debug!(version = %descriptor.version, "fetched version descriptor");
        Ok(descriptor)
    }

    /// Whether the local artifact already matches this descriptor
    #[must_use]
    pub fn matches(&self, local_version: &str, local_digest: &str) -> bool {
        self.version == local_version && self.digest.eq_ignore_ascii_case(local_digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_field_line() {
        let descriptor = VersionDescriptor::parse("1.2.0 ABC123\n").unwrap();
        assert_eq!(descriptor.version, "1.2.0");
        assert_eq!(descriptor.digest, "abc123");
    }

    #[test]
    fn only_first_line_is_authoritative() {
        let descriptor = VersionDescriptor::parse("1.2.0 abc123\n9.9.9 zzz\n").unwrap();
        assert_eq!(descriptor.version, "1.2.0");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(VersionDescriptor::parse("").is_err());
        assert!(VersionDescriptor::parse("1.2.0").is_err());
        assert!(VersionDescriptor::parse("1.2.0 abc extra").is_err());
    }

    #[test]
    fn matches_compares_version_and_digest() {
        let descriptor = VersionDescriptor::parse("1.1.9 def456").unwrap();
        assert!(descriptor.matches("1.1.9", "DEF456"));
        assert!(!descriptor.matches("1.2.0", "def456"));
        assert!(!descriptor.matches("1.1.9", "abc123"));
    }
}
