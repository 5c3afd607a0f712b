//! Response classification.
//!
//! Every probe ends in exactly one [`Verdict`]. The classifier is total:
//! malformed JSON, missing fields, and decode errors fold into
//! `ValidationFailed`, never into a panic or an error return.

use http::StatusCode;
use serde_json::Value;

/// Classification of a single request/response pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    RateLimited,
    CloudflareBlocked,
    ValidationFailed,
    TransportError,
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Success => "success",
            Verdict::RateLimited => "rate_limited",
            Verdict::CloudflareBlocked => "cloudflare_blocked",
            Verdict::ValidationFailed => "validation_failed",
            Verdict::TransportError => "transport_error",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw outcome of one probe, before classification.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    /// Network failure or timeout; the message is kept for logging only.
    TransportFailure(String),
    /// The request completed with a status and body text.
    Http { status: StatusCode, body: String },
}

/// JSON field rule: the named top-level field must equal the expected value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEquals {
    pub field: String,
    pub expected: Value,
}

/// Validation rules supplied by the API descriptor.
#[derive(Debug, Clone, Default)]
pub struct ValidationRules {
    /// Substrings whose presence in the body marks a Cloudflare block.
    pub cloudflare_indicators: Vec<String>,
    /// Substrings whose presence in the body marks a rate-limit rejection.
    pub ratelimit_indicators: Vec<String>,
    /// Optional success-field check applied to 2xx JSON bodies.
    pub success_rule: Option<FieldEquals>,
}

/// Turn a probe outcome into a verdict. First match wins:
/// transport failure, status 429, Cloudflare indicator, rate-limit
/// indicator, non-2xx status, then the success-field rule.
pub fn classify(outcome: &ProbeOutcome, rules: &ValidationRules) -> Verdict {
    let (status, body) = match outcome {
        ProbeOutcome::TransportFailure(_) => return Verdict::TransportError,
        ProbeOutcome::Http { status, body } => (*status, body),
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Verdict::RateLimited;
    }

    let lowered = body.to_lowercase();
    if contains_any(&lowered, &rules.cloudflare_indicators) {
        return Verdict::CloudflareBlocked;
    }
    if contains_any(&lowered, &rules.ratelimit_indicators) {
        return Verdict::RateLimited;
    }

    if !status.is_success() {
        return Verdict::TransportError;
    }

    match &rules.success_rule {
        Some(rule) => match serde_json::from_str::<Value>(body) {
            Ok(doc) if doc.get(&rule.field) == Some(&rule.expected) => Verdict::Success,
            _ => Verdict::ValidationFailed,
        },
        None => Verdict::Success,
    }
}

fn contains_any(lowered_body: &str, indicators: &[String]) -> bool {
    indicators
        .iter()
        .any(|needle| lowered_body.contains(&needle.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http(status: u16, body: &str) -> ProbeOutcome {
        ProbeOutcome::Http {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
        }
    }

    fn rules() -> ValidationRules {
        ValidationRules {
            cloudflare_indicators: vec!["Cloudflare".into(), "cf-ray".into()],
            ratelimit_indicators: vec!["rate limit exceeded".into()],
            success_rule: None,
        }
    }

    #[test]
    fn transport_failure_wins_over_everything() {
        let outcome = ProbeOutcome::TransportFailure("connection refused".into());
        assert_eq!(classify(&outcome, &rules()), Verdict::TransportError);
    }

    #[test]
    fn status_429_precedes_body_checks() {
        // 429 with a Cloudflare indicator still classifies as rate limited.
        let outcome = http(429, "Attention Required! | Cloudflare");
        assert_eq!(classify(&outcome, &rules()), Verdict::RateLimited);
    }

    #[test]
    fn cloudflare_indicator_is_case_insensitive() {
        let outcome = http(200, "blocked by CLOUDFLARE security");
        assert_eq!(classify(&outcome, &rules()), Verdict::CloudflareBlocked);
    }

    #[test]
    fn cloudflare_precedes_ratelimit_indicator() {
        let outcome = http(200, "cf-ray: rate limit exceeded");
        assert_eq!(classify(&outcome, &rules()), Verdict::CloudflareBlocked);
    }

    #[test]
    fn ratelimit_indicator_in_body() {
        let outcome = http(200, "{\"error\":\"Rate Limit Exceeded\"}");
        assert_eq!(classify(&outcome, &rules()), Verdict::RateLimited);
    }

    #[test]
    fn non_2xx_is_transport_error() {
        assert_eq!(classify(&http(500, "oops"), &rules()), Verdict::TransportError);
        assert_eq!(classify(&http(403, ""), &rules()), Verdict::TransportError);
    }

    #[test]
    fn plain_2xx_without_rule_is_success() {
        assert_eq!(classify(&http(200, "anything"), &rules()), Verdict::Success);
        assert_eq!(classify(&http(204, ""), &rules()), Verdict::Success);
    }

    #[test]
    fn success_field_rule() {
        let mut r = rules();
        r.success_rule = Some(FieldEquals {
            field: "success".into(),
            expected: json!(true),
        });

        assert_eq!(
            classify(&http(200, r#"{"success":true,"data":[]}"#), &r),
            Verdict::Success
        );
        assert_eq!(
            classify(&http(200, r#"{"success":false}"#), &r),
            Verdict::ValidationFailed
        );
        // Field absent.
        assert_eq!(
            classify(&http(200, r#"{"ok":true}"#), &r),
            Verdict::ValidationFailed
        );
        // Not JSON at all.
        assert_eq!(
            classify(&http(200, "<html>hello</html>"), &r),
            Verdict::ValidationFailed
        );
    }

    #[test]
    fn success_field_rule_with_string_value() {
        let r = ValidationRules {
            success_rule: Some(FieldEquals {
                field: "status".into(),
                expected: json!("ok"),
            }),
            ..Default::default()
        };
        assert_eq!(
            classify(&http(200, r#"{"status":"ok"}"#), &r),
            Verdict::Success
        );
        assert_eq!(
            classify(&http(200, r#"{"status":"error"}"#), &r),
            Verdict::ValidationFailed
        );
    }

    #[test]
    fn verdict_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Verdict::RateLimited).unwrap(),
            "\"rate_limited\""
        );
        assert_eq!(
            serde_json::to_string(&Verdict::CloudflareBlocked).unwrap(),
            "\"cloudflare_blocked\""
        );
    }
}
