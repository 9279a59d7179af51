//! Derivation of tenant schema names from account records.

use uuid::Uuid;

use super::identifier::{IdentifierViolation, MAX_IDENTIFIER_LENGTH, TenantSchema, check_identifier};
use crate::error::{StorageError, StorageResult};

/// Number of account-id hex characters appended to every schema name.
const SUFFIX_LEN: usize = 6;

/// Slug used when an account name normalizes to nothing.
const FALLBACK_SLUG: &str = "tenant";

/// Builds tenant schema names of the form `<prefix><slug>_<suffix>`.
///
/// The slug is the account name lowercased, with every run of characters
/// outside `[a-z0-9]` collapsed into one underscore. The suffix is the first
/// six hex digits of the account id, which keeps two accounts with the same
/// name apart. The slug is truncated so the full name never exceeds 63
/// characters.
///
/// # Examples
///
/// ```
/// use strata_tenancy::schema::SchemaNaming;
/// use uuid::Uuid;
///
/// let naming = SchemaNaming::default();
/// let account = Uuid::parse_str("ab12cd34-0000-4000-8000-000000000000").unwrap();
/// let schema = naming.for_account("ACME Corp.", account).unwrap();
/// assert_eq!(schema.as_str(), "t_acme_corp_ab12cd");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNaming {
    prefix: String,
}

impl Default for SchemaNaming {
    fn default() -> Self {
        Self {
            prefix: "t_".to_string(),
        }
    }
}

impl SchemaNaming {
    /// Creates a naming scheme with the given prefix.
    ///
    /// The prefix must itself be a valid identifier start and leave room for
    /// at least one slug character and the suffix.
    pub fn new(prefix: impl Into<String>) -> StorageResult<Self> {
        let prefix = prefix.into();
        let budget = MAX_IDENTIFIER_LENGTH - SUFFIX_LEN - 2;

        match check_identifier(&prefix) {
            Ok(()) if prefix.len() <= budget => Ok(Self { prefix }),
            Ok(()) => Err(StorageError::invalid_schema(
                &prefix,
                format!("schema prefix may be at most {} characters", budget),
            )),
            Err(IdentifierViolation::Blank) => Err(StorageError::invalid_schema(
                &prefix,
                "schema prefix must not be blank",
            )),
            Err(violation) => Err(StorageError::invalid_schema(&prefix, violation.to_string())),
        }
    }

    /// Returns the configured prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derives the schema name for an account.
    pub fn for_account(&self, account_name: &str, account_id: Uuid) -> StorageResult<TenantSchema> {
        let simple = account_id.simple().to_string();
        let suffix = &simple[..SUFFIX_LEN];

        let max_slug = MAX_IDENTIFIER_LENGTH - self.prefix.len() - 1 - SUFFIX_LEN;
        let mut slug = normalize_slug(account_name);
        if slug.is_empty() {
            slug = FALLBACK_SLUG.to_string();
        }
        slug.truncate(max_slug);
        let slug = slug.trim_end_matches('_');

        TenantSchema::parse(&format!("{}{}_{}", self.prefix, slug, suffix))
    }
}

/// Lowercases and collapses every non-alphanumeric run into a single `_`.
fn normalize_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Uuid {
        Uuid::parse_str("ab12cd34-5678-4000-8000-000000000000").unwrap()
    }

    #[test]
    fn test_default_prefix() {
        assert_eq!(SchemaNaming::default().prefix(), "t_");
    }

    #[test]
    fn test_for_account_simple() {
        let schema = SchemaNaming::default().for_account("acme", account()).unwrap();
        assert_eq!(schema.as_str(), "t_acme_ab12cd");
    }

    #[test]
    fn test_for_account_normalizes_punctuation() {
        let schema = SchemaNaming::default()
            .for_account("  Café -- Dupont & Fils!! ", account())
            .unwrap();
        assert_eq!(schema.as_str(), "t_caf_dupont_fils_ab12cd");
    }

    #[test]
    fn test_for_account_empty_name_uses_fallback() {
        let schema = SchemaNaming::default().for_account("!!!", account()).unwrap();
        assert_eq!(schema.as_str(), "t_tenant_ab12cd");
    }

    #[test]
    fn test_for_account_truncates_to_limit() {
        let long_name = "a".repeat(200);
        let schema = SchemaNaming::default().for_account(&long_name, account()).unwrap();
        assert_eq!(schema.as_str().len(), MAX_IDENTIFIER_LENGTH);
        assert!(schema.as_str().ends_with("_ab12cd"));
    }

    #[test]
    fn test_truncation_does_not_leave_double_underscore() {
        // 54 slug characters fit; the 54th is a separator after truncation.
        let name = format!("{}-{}", "a".repeat(53), "b".repeat(10));
        let schema = SchemaNaming::default().for_account(&name, account()).unwrap();
        assert!(!schema.as_str().contains("__"));
    }

    #[test]
    fn test_custom_prefix() {
        let naming = SchemaNaming::new("org_").unwrap();
        let schema = naming.for_account("acme", account()).unwrap();
        assert_eq!(schema.as_str(), "org_acme_ab12cd");
    }

    #[test]
    fn test_invalid_prefix() {
        assert!(SchemaNaming::new("").is_err());
        assert!(SchemaNaming::new("Org_").is_err());
        assert!(SchemaNaming::new("1_").is_err());
        assert!(SchemaNaming::new("p".repeat(60)).is_err());
    }

    #[test]
    fn test_different_accounts_same_name_differ() {
        let other = Uuid::parse_str("ffeedd00-0000-4000-8000-000000000000").unwrap();
        let naming = SchemaNaming::default();
        let a = naming.for_account("acme", account()).unwrap();
        let b = naming.for_account("acme", other).unwrap();
        assert_ne!(a, b);
    }
}
