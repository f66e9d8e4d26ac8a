// ============================================================================
// Vault Core - SQL Identifier Sanitization
// File: crates/vault-core/src/domain/identifier.rs
// Description: Allow-list sanitization for identifiers that end up in DDL
// ============================================================================
//! Identifiers cannot be bound as query parameters, so every schema, table and policy name
//! derived from tenant input goes through this module before any DDL string is built.

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;
use vault_shared::constants::{
    MAX_IDENTIFIER_LENGTH, MAX_SCHEMA_PREFIX_LENGTH, SCHEMA_PREFIX_MARKER,
    SCHEMA_PREFIX_SUFFIX_LENGTH,
};

use crate::error::DomainError;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static regex"))
}

fn invalid_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"))
}

/// Check an identifier against the allow-list without rewriting it.
pub fn validate_identifier(ident: &str) -> Result<&str, DomainError> {
    if ident.is_empty() || ident.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DomainError::ValidationError(format!(
            "identifier must be 1..={} bytes: '{}'",
            MAX_IDENTIFIER_LENGTH, ident
        )));
    }
    if !identifier_pattern().is_match(ident) {
        return Err(DomainError::ValidationError(format!(
            "identifier contains characters outside [a-z0-9_]: '{}'",
            ident
        )));
    }
    Ok(ident)
}

/// Lower-case `raw`, collapse every run of disallowed characters into one underscore and bound
/// the result to `max_len` bytes.
pub fn sanitize_identifier(raw: &str, max_len: usize) -> Result<String, DomainError> {
    let lowered = raw.trim().to_lowercase();
    let collapsed = invalid_run_pattern().replace_all(&lowered, "_");
    let mut ident = collapsed.trim_matches('_').to_string();

    if ident.is_empty() {
        return Err(DomainError::ValidationError(format!(
            "'{}' has no characters usable in an identifier",
            raw
        )));
    }
    if ident.as_bytes()[0].is_ascii_digit() {
        ident.insert(0, '_');
    }

    // Only ASCII survives the replacement above, so byte truncation is char-safe.
    let bound = max_len.min(MAX_IDENTIFIER_LENGTH);
    ident.truncate(bound);
    let ident = ident.trim_end_matches('_').to_string();

    validate_identifier(&ident)?;
    Ok(ident)
}

/// Derive the schema prefix for a tenant: `t_<slug>_<suffix>`.
///
/// The suffix comes from the tenant id, so two different tenants never share a prefix even when
/// their names sanitize to the same slug.
pub fn derive_schema_prefix(name: &str, tenant_id: &Uuid) -> Result<String, DomainError> {
    let suffix: String = tenant_id
        .simple()
        .to_string()
        .chars()
        .take(SCHEMA_PREFIX_SUFFIX_LENGTH)
        .collect();
    let slug_budget =
        MAX_SCHEMA_PREFIX_LENGTH - SCHEMA_PREFIX_MARKER.len() - SCHEMA_PREFIX_SUFFIX_LENGTH - 2;
    // Names with nothing usable (e.g. only non-Latin script) get a suffix-only prefix.
    let slug = sanitize_identifier(name, slug_budget).unwrap_or_default();
    let slug = slug.trim_start_matches('_');

    let prefix = if slug.is_empty() {
        format!("{}_{}", SCHEMA_PREFIX_MARKER, suffix)
    } else {
        format!("{}_{}_{}", SCHEMA_PREFIX_MARKER, slug, suffix)
    };
    validate_identifier(&prefix)?;
    Ok(prefix)
}

/// Double-quote an already validated identifier for use in DDL.
pub fn quote_ident(ident: &str) -> Result<String, DomainError> {
    validate_identifier(ident).map(|i| format!("\"{}\"", i))
}

/// `"schema"."table"` for a validated pair.
pub fn qualified(schema: &str, table: &str) -> Result<String, DomainError> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(table)?))
}
