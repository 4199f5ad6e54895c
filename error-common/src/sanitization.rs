//! Message sanitization invoked by the interceptor chain's error classifier
//! before an error crosses the trust boundary.
use crate::types::PolykeyError;

/// Never includes key IDs, wrapped key material, or internal error text for
/// a sensitive error; returns the fixed per-class message instead.
pub fn sanitize_for_client(error: &PolykeyError) -> String {
    error.sanitized().message
}

/// Strip any substring that looks like a UUID from a free-form string before
/// it is attached to a log line a human might forward externally. This is a
/// belt-and-suspenders pass; callers should prefer structured fields over
/// interpolating raw text.
pub fn strip_identifiers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut token = String::new();
    for ch in text.chars() {
        if ch.is_ascii_hexdigit() || ch == '-' {
            token.push(ch);
        } else {
            flush_token(&mut out, &mut token);
            out.push(ch);
        }
    }
    flush_token(&mut out, &mut token);
    out
}

fn flush_token(out: &mut String, token: &mut String) {
    if token.len() >= 32 && token.chars().filter(|c| *c == '-').count() >= 4 {
        out.push_str("[redacted-id]");
    } else {
        out.push_str(token);
    }
    token.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_uuid_like_tokens() {
        let text = "key 3fa85f64-5717-4562-b3fc-2c963f66afa6 not found";
        assert_eq!(strip_identifiers(text), "key [redacted-id] not found");
    }

    #[test]
    fn leaves_short_tokens_alone() {
        assert_eq!(strip_identifiers("v1-active"), "v1-active");
    }
}
