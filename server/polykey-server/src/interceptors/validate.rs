//! Per-request-shape validation. Each function checks one piece of the
//! request-processing pipeline's validate stage; the gRPC handlers call the
//! ones relevant to their request shape before handing off to the service.
use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tonic::Status;

pub const MAX_SERIALIZED_SIZE: usize = 64 * 1024;
pub const MAX_DESCRIPTION_LEN: usize = 255;
pub const MAX_TAGS: usize = 50;
pub const MAX_TAG_KEY_LEN: usize = 128;
pub const MAX_TAG_VALUE_LEN: usize = 256;
pub const MAX_AUTHORIZED_CONTEXTS: usize = 100;
pub const MAX_CONTEXT_LEN: usize = 256;
pub const MAX_POLICIES: usize = 50;
pub const DEFAULT_PAGE_SIZE: i32 = 100;
pub const MAX_PAGE_SIZE: i32 = 1000;
pub const MAX_PAGE_TOKEN_LEN: usize = 256;
pub const MAX_DATE_RANGE: chrono::Duration = chrono::Duration::days(365);

/// Compiles `pattern` once behind a `OnceLock`, keeping the compile
/// `Result` rather than unwrapping it so a (never-expected) bad pattern
/// surfaces as an internal error instead of a panic.
fn compiled(cell: &'static OnceLock<Result<Regex, regex::Error>>, pattern: &str) -> Result<&'static Regex, Status> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|err| Status::internal(format!("validation pattern failed to compile: {err}")))
}

fn tag_key_re() -> Result<&'static Regex, Status> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    compiled(&RE, r"^[A-Za-z][A-Za-z0-9_-]{0,127}$")
}

fn tag_value_forbidden_re() -> Result<&'static Regex, Status> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    compiled(&RE, r#"[<>"']"#)
}

fn context_re() -> Result<&'static Regex, Status> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    compiled(&RE, r"^[A-Za-z0-9][A-Za-z0-9._-]{0,255}$")
}

fn page_token_forbidden_re() -> Result<&'static Regex, Status> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    compiled(&RE, r#"[;'"<>]"#)
}

pub fn validate_size_budget(encoded_len: usize) -> Result<(), Status> {
    if encoded_len > MAX_SERIALIZED_SIZE {
        return Err(Status::invalid_argument(format!(
            "request exceeds the {MAX_SERIALIZED_SIZE}-byte size budget"
        )));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), Status> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(Status::invalid_argument(format!(
            "description exceeds {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_tags(tags: &HashMap<String, String>) -> Result<(), Status> {
    if tags.len() > MAX_TAGS {
        return Err(Status::invalid_argument(format!("tags exceed {MAX_TAGS} entries")));
    }
    for (key, value) in tags {
        if key.chars().count() > MAX_TAG_KEY_LEN || !tag_key_re()?.is_match(key) {
            return Err(Status::invalid_argument(format!("tag key \"{key}\" is invalid")));
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            return Err(Status::invalid_argument(format!("tag value for \"{key}\" is too long")));
        }
        if tag_value_forbidden_re()?.is_match(value) {
            return Err(Status::invalid_argument(format!(
                "tag value for \"{key}\" contains a forbidden character"
            )));
        }
    }
    Ok(())
}

pub fn validate_authorized_contexts(contexts: &[String]) -> Result<(), Status> {
    if contexts.len() > MAX_AUTHORIZED_CONTEXTS {
        return Err(Status::invalid_argument(format!(
            "authorized contexts exceed {MAX_AUTHORIZED_CONTEXTS} entries"
        )));
    }
    let mut seen = std::collections::HashSet::with_capacity(contexts.len());
    for context in contexts {
        if context.chars().count() > MAX_CONTEXT_LEN || !context_re()?.is_match(context) {
            return Err(Status::invalid_argument(format!(
                "authorized context \"{context}\" is invalid"
            )));
        }
        if !seen.insert(context) {
            return Err(Status::invalid_argument(format!(
                "authorized context \"{context}\" is duplicated"
            )));
        }
    }
    Ok(())
}

pub fn validate_access_policies(policies: &HashMap<String, String>) -> Result<(), Status> {
    if policies.len() > MAX_POLICIES {
        return Err(Status::invalid_argument(format!("policies exceed {MAX_POLICIES} entries")));
    }
    for (key, value) in policies {
        if serde_json::from_str::<serde_json::Value>(value).is_err() {
            return Err(Status::invalid_argument(format!("policy \"{key}\" is not valid JSON")));
        }
    }
    Ok(())
}

/// Clamps an unset/zero page size to the default and rejects anything past
/// the cap rather than silently truncating it.
pub fn clamp_page_size(requested: i32) -> Result<i32, Status> {
    if requested == 0 {
        return Ok(DEFAULT_PAGE_SIZE);
    }
    if requested < 0 || requested > MAX_PAGE_SIZE {
        return Err(Status::invalid_argument(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(requested)
}

pub fn validate_page_token(token: &str) -> Result<(), Status> {
    if token.is_empty() {
        return Ok(());
    }
    if token.len() > MAX_PAGE_TOKEN_LEN || page_token_forbidden_re()?.is_match(token) {
        return Err(Status::invalid_argument("page_token is malformed"));
    }
    Ok(())
}

pub fn validate_date_range(after: Option<DateTime<Utc>>, before: Option<DateTime<Utc>>) -> Result<(), Status> {
    if let (Some(after), Some(before)) = (after, before) {
        if before < after {
            return Err(Status::invalid_argument("created_before precedes created_after"));
        }
        if before - after > MAX_DATE_RANGE {
            return Err(Status::invalid_argument("the created_after/created_before range exceeds 1 year"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_at_limit_is_ok() {
        let description = "a".repeat(MAX_DESCRIPTION_LEN);
        assert!(validate_description(&description).is_ok());
    }

    #[test]
    fn description_over_limit_fails() {
        let description = "a".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(validate_description(&description).is_err());
    }

    #[test]
    fn tag_key_rejects_leading_digit() {
        let mut tags = HashMap::new();
        tags.insert("1bad".to_string(), "value".to_string());
        assert!(validate_tags(&tags).is_err());
    }

    #[test]
    fn tag_value_rejects_angle_brackets() {
        let mut tags = HashMap::new();
        tags.insert("good".to_string(), "<script>".to_string());
        assert!(validate_tags(&tags).is_err());
    }

    #[test]
    fn context_deduplication_is_enforced() {
        let contexts = vec!["ctx-a".to_string(), "ctx-a".to_string()];
        assert!(validate_authorized_contexts(&contexts).is_err());
    }

    #[test]
    fn policy_value_must_be_valid_json() {
        let mut policies = HashMap::new();
        policies.insert("p1".to_string(), "not json".to_string());
        assert!(validate_access_policies(&policies).is_err());
    }

    #[test]
    fn page_size_zero_defaults() {
        assert_eq!(clamp_page_size(0).unwrap(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn page_size_over_cap_rejected() {
        assert!(clamp_page_size(MAX_PAGE_SIZE + 1).is_err());
    }

    #[test]
    fn page_token_rejects_forbidden_chars() {
        assert!(validate_page_token("abc<def").is_err());
    }

    #[test]
    fn date_range_over_one_year_rejected() {
        let after = Utc::now();
        let before = after + chrono::Duration::days(400);
        assert!(validate_date_range(Some(after), Some(before)).is_err());
    }
}
