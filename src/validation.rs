//! Request DTO validation.
//!
//! DTOs derive [`validator::Validate`] and deserialize leniently (missing
//! strings default to empty). Failures are flattened into a list of
//! `{ key, message }` pairs keyed by the camelCase wire name.

use std::borrow::Cow;
use std::sync::LazyLock;

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::AppError;

pub static OTP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("otp pattern is valid"));

pub const PASSWORD_RULE: &str = "Password must contain at least 8 characters, one uppercase letter, one lowercase letter, one number and one special character";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub key: String,
    pub message: String,
}

impl FieldError {
    pub fn new(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

pub fn strong_password(value: &str) -> Result<(), ValidationError> {
    not_blank(value)?;
    if !is_strong_password(value) {
        return Err(ValidationError::new("password"));
    }
    Ok(())
}

pub fn valid_uuid(value: &str) -> Result<(), ValidationError> {
    not_blank(value)?;
    if Uuid::parse_str(value.trim()).is_err() {
        return Err(ValidationError::new("uuid"));
    }
    Ok(())
}

pub fn recipients(values: &[String]) -> Result<(), ValidationError> {
    if values.iter().any(|v| !v.validate_email()) {
        return Err(ValidationError::new("recipients"));
    }
    Ok(())
}

pub fn is_strong_password(value: &str) -> bool {
    value.chars().count() >= 8
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| c.is_ascii_punctuation())
}

/// Struct-level failure reported under `key` rather than `__all__`.
pub fn mismatch(key: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(key).with_message(Cow::Borrowed(message))
}

/// Parse a UUID that arrived as a path segment or DTO field.
pub fn parse_uuid(key: &str, value: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value.trim()).map_err(|_| {
        AppError::Validation(vec![FieldError::new(key, format!("{key} must be a valid UUID"))])
    })
}

/// Emails are compared case-insensitively and stored lowercased.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Flatten nested validator output, one entry per key, sorted by key.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let field: &str = field;
        match kind {
            ValidationErrorsKind::Field(list) if field == "__all__" => {
                for err in list {
                    let key = format!("{prefix}{}", err.code);
                    push_first(out, key, err);
                }
            }
            ValidationErrorsKind::Field(list) => {
                let chosen = list
                    .iter()
                    .find(|e| e.code == "required")
                    .or_else(|| list.first());
                if let Some(err) = chosen {
                    push_first(out, format!("{prefix}{}", camel_case(field)), err);
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                collect(inner, &format!("{prefix}{}.", camel_case(field)), out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{prefix}{}[{index}].", camel_case(field)), out);
                }
            }
        }
    }
}

fn push_first(out: &mut Vec<FieldError>, key: String, err: &ValidationError) {
    if out.iter().any(|e| e.key == key) {
        return;
    }
    let message = match &err.message {
        Some(message) => message.to_string(),
        None => describe(&key, &err.code),
    };
    out.push(FieldError { key, message });
}

fn describe(name: &str, code: &str) -> String {
    match code {
        "required" => format!("{name} is required"),
        "email" => format!("{name} must be a valid email"),
        "otp" => format!("{name} must be a 6-digit number"),
        "uuid" => format!("{name} must be a valid UUID"),
        "password" => PASSWORD_RULE.to_string(),
        "recipients" => "Each recipient email must be valid".to_string(),
        "empty" => format!("{name} cannot be empty"),
        _ => format!("{name} is invalid"),
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// JSON body extractor that runs [`Validate`] after deserializing.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::PayloadTooLarge
            } else {
                AppError::BadRequest(rejection.body_text())
            }
        })?;
        value
            .validate()
            .map_err(|errors| AppError::Validation(field_errors(&errors)))?;
        Ok(ValidJson(value))
    }
}

/// Query string extractor that runs [`Validate`] after deserializing.
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value
            .validate()
            .map_err(|errors| AppError::Validation(field_errors(&errors)))?;
        Ok(ValidQuery(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Validate)]
    struct Contact {
        #[validate(custom(function = "not_blank"), email)]
        email_address: String,
        #[validate(custom(function = "not_blank"), regex(path = *OTP_RE, code = "otp"))]
        otp: String,
    }

    #[derive(Debug, Default, serde::Serialize, Validate)]
    struct Message {
        #[validate(length(min = 1, code = "empty"), custom(function = "recipients"))]
        to: Vec<String>,
        #[validate(custom(function = "not_blank"))]
        subject: String,
    }

    #[derive(Debug, Default, Validate)]
    struct Batch {
        #[validate(length(min = 1, code = "empty"), nested)]
        groups: Vec<Message>,
    }

    #[derive(Debug, Default, Validate)]
    #[validate(schema(function = "confirm_matches"))]
    struct Passwords {
        #[validate(custom(function = "strong_password"))]
        new_password: String,
        confirm_password: String,
    }

    fn confirm_matches(p: &Passwords) -> Result<(), ValidationError> {
        if p.new_password != p.confirm_password {
            return Err(mismatch("confirmPassword", "Confirm password does not match new password"));
        }
        Ok(())
    }

    #[test]
    fn password_policy() {
        assert!(is_strong_password("Sup3r$ecret"));
        assert!(!is_strong_password("Sh0rt!"));
        assert!(!is_strong_password("alllowercase1!"));
        assert!(!is_strong_password("NoDigitsHere!"));
        assert!(!is_strong_password("NoSpecial123"));
        assert_eq!(strong_password("").unwrap_err().code, "required");
        assert_eq!(strong_password("weak").unwrap_err().code, "password");
    }

    #[test]
    fn reports_first_failure_per_camel_case_key() {
        let contact = Contact {
            email_address: String::new(),
            otp: "12ab56".into(),
        };
        let errors = field_errors(&contact.validate().unwrap_err());

        assert_eq!(
            errors,
            vec![
                FieldError::new("emailAddress", "emailAddress is required"),
                FieldError::new("otp", "otp must be a 6-digit number"),
            ]
        );
    }

    #[test]
    fn email_shape() {
        let bad = Contact {
            email_address: "no-at.example.com".into(),
            otp: "123456".into(),
        };
        assert_eq!(
            field_errors(&bad.validate().unwrap_err()),
            vec![FieldError::new("emailAddress", "emailAddress must be a valid email")]
        );

        let good = Contact {
            email_address: "someone@example.com".into(),
            otp: "123456".into(),
        };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn uuid_check_and_parse() {
        let id = Uuid::new_v4().to_string();
        assert!(valid_uuid(&id).is_ok());
        assert_eq!(valid_uuid("not-a-uuid").unwrap_err().code, "uuid");
        assert_eq!(valid_uuid(" ").unwrap_err().code, "required");
        assert!(parse_uuid("userId", &id).is_ok());
        assert!(matches!(
            parse_uuid("userId", "nope"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn recipient_lists() {
        let ok = vec!["a@example.com".to_string(), "b@example.com".to_string()];
        let bad = vec!["a@example.com".to_string(), "nope".to_string()];
        assert!(recipients(&ok).is_ok());
        assert!(recipients(&bad).is_err());

        let empty = Message {
            to: vec![],
            subject: "hi".into(),
        };
        assert_eq!(
            field_errors(&empty.validate().unwrap_err()),
            vec![FieldError::new("to", "to cannot be empty")]
        );
    }

    #[test]
    fn nested_list_errors_are_indexed() {
        let batch = Batch {
            groups: vec![
                Message {
                    to: vec!["a@example.com".into()],
                    subject: "ok".into(),
                },
                Message {
                    to: vec!["nope".into()],
                    subject: " ".into(),
                },
            ],
        };
        let errors = field_errors(&batch.validate().unwrap_err());

        assert_eq!(
            errors,
            vec![
                FieldError::new("groups[1].subject", "groups[1].subject is required"),
                FieldError::new("groups[1].to", "Each recipient email must be valid"),
            ]
        );

        let empty = Batch { groups: vec![] };
        assert_eq!(
            field_errors(&empty.validate().unwrap_err()),
            vec![FieldError::new("groups", "groups cannot be empty")]
        );
    }

    #[test]
    fn struct_level_errors_use_their_own_key() {
        let p = Passwords {
            new_password: "Sup3r$ecret".into(),
            confirm_password: "Different1!".into(),
        };
        assert_eq!(
            field_errors(&p.validate().unwrap_err()),
            vec![FieldError::new(
                "confirmPassword",
                "Confirm password does not match new password"
            )]
        );
    }
}
