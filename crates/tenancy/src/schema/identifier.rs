//! Validated schema and table identifiers.
//!
//! [`TenantSchema`] and [`TableName`] are the only way a raw string reaches
//! SQL text in this crate. Both accept exactly `^[a-z][a-z0-9_]*$` with at most
//! [`MAX_IDENTIFIER_LENGTH`] characters, which keeps every identifier safe to
//! splice into DDL after quoting.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, StorageError, StorageResult};

/// The reserved control-plane schema holding cross-tenant data.
///
/// It is never a valid target for tenant provisioning or tenant-scoped work.
pub const CONTROL_PLANE_SCHEMA: &str = "public";

/// PostgreSQL identifier limit.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Human-readable form of the accepted pattern, used in error messages.
pub const IDENTIFIER_PATTERN: &str = "^[a-z][a-z0-9_]*$";

static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IDENTIFIER_PATTERN).expect("identifier pattern is valid"));

/// Why a raw identifier was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdentifierViolation {
    Blank,
    TooLong(usize),
    Pattern,
}

impl fmt::Display for IdentifierViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierViolation::Blank => write!(f, "must not be blank"),
            IdentifierViolation::TooLong(len) => write!(
                f,
                "length {} exceeds maximum of {} characters",
                len, MAX_IDENTIFIER_LENGTH
            ),
            IdentifierViolation::Pattern => write!(f, "must match {}", IDENTIFIER_PATTERN),
        }
    }
}

/// Checks `candidate` against the identifier rules.
pub(crate) fn check_identifier(candidate: &str) -> Result<(), IdentifierViolation> {
    if candidate.is_empty() {
        return Err(IdentifierViolation::Blank);
    }
    if candidate.len() > MAX_IDENTIFIER_LENGTH {
        return Err(IdentifierViolation::TooLong(candidate.len()));
    }
    if !IDENTIFIER_REGEX.is_match(candidate) {
        return Err(IdentifierViolation::Pattern);
    }
    Ok(())
}

/// A validated tenant schema identifier.
///
/// Construction goes through [`TenantSchema::parse`], which trims surrounding
/// whitespace and rejects blank values, values over 63 characters, anything
/// outside `[a-z0-9_]` (or not starting with a letter) and the reserved
/// [`CONTROL_PLANE_SCHEMA`].
///
/// # Examples
///
/// ```
/// use strata_tenancy::schema::TenantSchema;
///
/// let schema = TenantSchema::parse(" t_acme_ab12cd ").unwrap();
/// assert_eq!(schema.as_str(), "t_acme_ab12cd");
///
/// assert!(TenantSchema::parse("Bad-Name!").is_err());
/// assert!(TenantSchema::parse("public").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantSchema(String);

impl TenantSchema {
    /// Validates `raw` and returns the identifier.
    ///
    /// Fails with [`SchemaError::InvalidSchema`] before any I/O can happen.
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let candidate = raw.trim();
        check_identifier(candidate)
            .map_err(|violation| StorageError::invalid_schema(raw, violation.to_string()))?;

        if candidate == CONTROL_PLANE_SCHEMA {
            return Err(StorageError::invalid_schema(
                raw,
                "the control-plane schema is reserved",
            ));
        }

        Ok(Self(candidate.to_string()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier and returns the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for TenantSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantSchema({})", self.0)
    }
}

impl fmt::Display for TenantSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TenantSchema {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TenantSchema {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for TenantSchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A validated table name inside a tenant schema.
///
/// Table names follow the same rules as schema names. They are usually bound
/// as query parameters, but are validated anyway so that no unchecked name can
/// later be spliced into dynamic SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Validates `raw` as a table name.
    ///
    /// Blank input fails with [`SchemaError::TableRequired`], anything else
    /// that does not match the identifier rules with [`SchemaError::TableInvalid`].
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let candidate = raw.trim();
        match check_identifier(candidate) {
            Ok(()) => Ok(Self(candidate.to_string())),
            Err(IdentifierViolation::Blank) => Err(StorageError::Schema(SchemaError::TableRequired)),
            Err(violation) => Err(StorageError::invalid_table(raw, violation.to_string())),
        }
    }

    /// Returns the table name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
