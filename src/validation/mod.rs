//! # Schema Validation
//!
//! Request bodies are checked against static, declarative [`RuleSet`]s (see [`rules`]).
//! A body is validated in one pass and every violated field is reported once, with the
//! first failing check of that field, in rule-declaration order.
//!
//! Two entry points decode JSON bodies, and both sanitize before anything else looks at
//! the payload:
//! * [`validate_body`], the per-route stage that rejects with 400 before the handler runs;
//! * [`Payload`], the extractor handlers use to receive the typed, sanitized body.

pub mod rules;

use std::sync::LazyLock;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{
    config::MAX_BODY_BYTES,
    error::{AppError, FieldError},
    sanitize::sanitize,
};

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10}$").expect("valid regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("valid regex")
});
static URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:[^\s]+$").expect("valid regex"));

/// Named string shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// `YYYY-MM-DD`
    Date,
    /// Four digits.
    Year,
    /// Ten digits.
    Phone,
}

impl Pattern {
    fn regex(&self) -> &'static Regex {
        match self {
            Pattern::Date => &DATE_RE,
            Pattern::Year => &YEAR_RE,
            Pattern::Phone => &PHONE_RE,
        }
    }
}

/// Failure classes a message override can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Required,
    Type,
    Empty,
    Min,
    Max,
    Pattern,
    Email,
    Uri,
    /// Value outside an allowed set, or not equal to the referenced field.
    Only,
    Integer,
}

/// A single check. Checks after [`Check::Text`] assume a string and skip anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// A non-empty string.
    Text,
    MinLen(usize),
    MaxLen(usize),
    Matches(Pattern),
    Email,
    Uri,
    OneOf(&'static [&'static str]),
    /// An integer, given as a JSON number or a numeric string.
    Integer,
    AtLeast(i64),
    AtMost(i64),
    /// Equal to the value of another field in the same body.
    SameAs(&'static str),
}

type Failure = (Code, String);

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

impl Check {
    fn apply(&self, field: &str, value: &Value, body: &Map<String, Value>) -> Result<(), Failure> {
        let text = value.as_str();

        match *self {
            Check::Text => match text {
                None => Err((Code::Type, format!("\"{field}\" must be a string"))),
                Some("") => Err((Code::Empty, format!("\"{field}\" is not allowed to be empty"))),
                Some(_) => Ok(()),
            },
            Check::MinLen(min) => match text {
                Some(s) if s.chars().count() < min => Err((
                    Code::Min,
                    format!("\"{field}\" length must be at least {min} characters long"),
                )),
                _ => Ok(()),
            },
            Check::MaxLen(max) => match text {
                Some(s) if s.chars().count() > max => Err((
                    Code::Max,
                    format!(
                        "\"{field}\" length must be less than or equal to {max} characters long"
                    ),
                )),
                _ => Ok(()),
            },
            Check::Matches(pattern) => match text {
                Some(s) if !pattern.regex().is_match(s) => Err((
                    Code::Pattern,
                    format!(
                        "\"{field}\" with value \"{s}\" fails to match the required pattern: /{}/",
                        pattern.regex().as_str()
                    ),
                )),
                _ => Ok(()),
            },
            Check::Email => match text {
                Some(s) if !EMAIL_RE.is_match(s) => {
                    Err((Code::Email, format!("\"{field}\" must be a valid email")))
                }
                _ => Ok(()),
            },
            Check::Uri => match text {
                Some(s) if !URI_RE.is_match(s) => {
                    Err((Code::Uri, format!("\"{field}\" must be a valid uri")))
                }
                _ => Ok(()),
            },
            Check::OneOf(allowed) => match text {
                Some(s) if !allowed.contains(&s) => Err((
                    Code::Only,
                    format!("\"{field}\" must be one of [{}]", allowed.join(", ")),
                )),
                _ => Ok(()),
            },
            Check::Integer => match as_number(value) {
                None => Err((Code::Type, format!("\"{field}\" must be a number"))),
                Some(n) if n.fract() != 0.0 => {
                    Err((Code::Integer, format!("\"{field}\" must be an integer")))
                }
                Some(_) => Ok(()),
            },
            Check::AtLeast(min) => match as_number(value) {
                Some(n) if n < min as f64 => Err((
                    Code::Min,
                    format!("\"{field}\" must be greater than or equal to {min}"),
                )),
                _ => Ok(()),
            },
            Check::AtMost(max) => match as_number(value) {
                Some(n) if n > max as f64 => Err((
                    Code::Max,
                    format!("\"{field}\" must be less than or equal to {max}"),
                )),
                _ => Ok(()),
            },
            Check::SameAs(other) => {
                if body.get(other) == Some(value) {
                    Ok(())
                } else {
                    Err((Code::Only, format!("\"{field}\" must be [ref:{other}]")))
                }
            }
        }
    }
}

/// FieldRule
///
/// Presence, checks (applied in order) and optional message overrides for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub required: bool,
    pub checks: &'static [Check],
    pub messages: &'static [(Code, &'static str)],
}

impl FieldRule {
    pub const fn required(field: &'static str, checks: &'static [Check]) -> Self {
        Self {
            field,
            required: true,
            checks,
            messages: &[],
        }
    }

    pub const fn optional(field: &'static str, checks: &'static [Check]) -> Self {
        Self {
            field,
            required: false,
            checks,
            messages: &[],
        }
    }

    pub const fn messages(self, messages: &'static [(Code, &'static str)]) -> Self {
        Self { messages, ..self }
    }

    fn fail(&self, code: Code, default: String) -> FieldError {
        let message = self
            .messages
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, m)| m.to_string())
            .unwrap_or(default);
        FieldError::new(self.field, message)
    }

    fn check(&self, body: &Map<String, Value>) -> Result<(), FieldError> {
        let Some(value) = body.get(self.field) else {
            return match self.required {
                true => Err(self.fail(Code::Required, format!("\"{}\" is required", self.field))),
                false => Ok(()),
            };
        };

        for check in self.checks {
            check
                .apply(self.field, value, body)
                .map_err(|(code, default)| self.fail(code, default))?;
        }
        Ok(())
    }
}

/// RuleSet
///
/// A named, immutable table of field rules.
#[derive(Debug)]
pub struct RuleSet {
    pub name: &'static str,
    pub fields: &'static [FieldRule],
}

/// validate
///
/// Checks `body` against `rules`. Unknown keys are ignored. A body that is not a JSON
/// object fails as a whole with a single `value` entry.
pub fn validate(rules: &RuleSet, body: &Value) -> Result<(), Vec<FieldError>> {
    let Value::Object(map) = body else {
        return Err(vec![FieldError::new(
            "value",
            "\"value\" must be of type object",
        )]);
    };

    let errors: Vec<FieldError> = rules
        .fields
        .iter()
        .filter_map(|rule| rule.check(map).err())
        .collect();

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Client-facing messages for undecodable bodies. The decoder's own text is only logged.
pub const MALFORMED_JSON: &str = "Malformed JSON";
pub const UNREADABLE_BODY: &str = "Request body could not be read";
pub const UNEXPECTED_SHAPE: &str = "Request body does not match the expected shape";

/// Parses a raw body and sanitizes it. An empty body reads as `{}`.
pub fn decode_body(bytes: &[u8]) -> Result<Value, AppError> {
    let mut value = if bytes.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(bytes)
            .map_err(|e| {
                tracing::debug!(reason = %e, "body is not valid JSON");
                AppError::BadRequest(MALFORMED_JSON.to_string())
            })?
    };
    sanitize(&mut value);
    Ok(value)
}

/// validate_body
///
/// The per-route validation stage. Reads the body (bounded by [`MAX_BODY_BYTES`]), then
/// sanitizes and validates it. On failure it responds 400 directly; on success the handler
/// receives the sanitized body.
///
/// Mount with `middleware::from_fn(|req, next| validate_body(&rules::LOGIN, req, next))`.
pub async fn validate_body(rules: &'static RuleSet, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return AppError::BadRequest("Request body exceeds the 10 MB limit".to_string())
                .into_response();
        }
    };

    let value = match decode_body(&bytes) {
        Ok(value) => value,
        Err(err) => return err.into_response(),
    };

    if let Err(details) = validate(rules, &value) {
        tracing::debug!(rule_set = rules.name, failures = details.len(), "validation failed");
        return AppError::ValidationFailed(details).into_response();
    }

    let sanitized = match serde_json::to_vec(&value) {
        Ok(bytes) => bytes,
        Err(e) => return AppError::internal("SerializationError", e.to_string()).into_response(),
    };
    parts.headers.remove(header::CONTENT_LENGTH);

    next.run(Request::from_parts(parts, Body::from(sanitized)))
        .await
}

/// Payload
///
/// JSON body extractor. Decodes without requiring a `Content-Type`, sanitizes, then
/// deserializes into `T`. Rejects with a 400 envelope.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(reason = %rejection.body_text(), "request body rejected");
                AppError::BadRequest(UNREADABLE_BODY.to_string())
            })?;

        let value = decode_body(&bytes)?;
        serde_json::from_value(value)
            .map(Payload)
            .map_err(|e| {
                tracing::debug!(reason = %e, "body does not fit the payload type");
                AppError::BadRequest(UNEXPECTED_SHAPE.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static SAMPLE: RuleSet = RuleSet {
        name: "sample",
        fields: &[
            FieldRule::required("name", &[Check::Text, Check::MinLen(2), Check::MaxLen(5)]),
            FieldRule::required("phone", &[Check::Text, Check::Matches(Pattern::Phone)])
                .messages(&[(Code::Pattern, "Phone must be 10 digits")]),
            FieldRule::optional("site", &[Check::Text, Check::Uri]),
            FieldRule::required("count", &[Check::Integer, Check::AtLeast(1)]),
        ],
    };

    fn fields(result: Result<(), Vec<FieldError>>) -> Vec<String> {
        result.unwrap_err().into_iter().map(|e| e.field).collect()
    }

    #[test]
    fn valid_body_passes() {
        let body = json!({ "name": "Ana", "phone": "0123456789", "count": 3, "extra": true });
        assert!(validate(&SAMPLE, &body).is_ok());
    }

    #[test]
    fn every_failing_field_is_reported_in_declaration_order() {
        let body = json!({ "site": "not a uri", "count": 0 });
        assert_eq!(
            fields(validate(&SAMPLE, &body)),
            vec!["name", "phone", "site", "count"]
        );
    }

    #[test]
    fn only_the_first_failure_per_field_is_reported() {
        let body = json!({ "name": 7, "phone": "0123456789", "count": 1 });
        let errors = validate(&SAMPLE, &body).unwrap_err();
        assert_eq!(errors, vec![FieldError::new("name", "\"name\" must be a string")]);
    }

    #[test]
    fn overrides_replace_default_messages() {
        let body = json!({ "name": "Ana", "phone": "12", "count": 1 });
        let errors = validate(&SAMPLE, &body).unwrap_err();
        assert_eq!(errors[0].message, "Phone must be 10 digits");
    }

    #[test]
    fn length_is_counted_in_characters() {
        let body = json!({ "name": "ÉÉÉÉÉ", "phone": "0123456789", "count": 1 });
        assert!(validate(&SAMPLE, &body).is_ok());
    }

    #[test]
    fn numeric_strings_count_as_integers() {
        let body = json!({ "name": "Ana", "phone": "0123456789", "count": "4" });
        assert!(validate(&SAMPLE, &body).is_ok());

        let body = json!({ "name": "Ana", "phone": "0123456789", "count": 2.5 });
        let errors = validate(&SAMPLE, &body).unwrap_err();
        assert_eq!(errors[0].message, "\"count\" must be an integer");
    }

    #[test]
    fn non_object_body_fails_as_a_whole() {
        let errors = validate(&SAMPLE, &json!([1, 2])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "value");
    }

    #[test]
    fn empty_body_decodes_as_empty_object() {
        assert_eq!(decode_body(b"").unwrap(), json!({}));
        assert_eq!(decode_body(b"  \n").unwrap(), json!({}));
    }

    #[test]
    fn malformed_json_is_a_bad_request() {
        assert!(matches!(
            decode_body(b"{\"a\":"),
            Err(AppError::BadRequest(ref message)) if message == MALFORMED_JSON
        ));
    }

    #[test]
    fn decoded_body_is_sanitized() {
        let value = decode_body(br#"{"name":" <i>x</i> ","$ne":1}"#).unwrap();
        assert_eq!(value, json!({ "name": "&lt;i>x&lt;/i>" }));
    }
}
