//! Auth HTTP handlers: register, login, me, refresh-token, refresh-session.

use std::borrow::Cow;

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

use crate::error::{AppError, AppResult};
use crate::handlers::http::AppState;
use crate::middleware::{AuthUser, ValidatedJson};
use crate::models::{PublicUser, Role};
use crate::services::{Registration, Session};

/// Every failing rule is reported, several per field where they apply.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(err) = validate_name(&self.name) {
            errors.add("name", err);
        }
        if !self.email.validate_email() {
            errors.add(
                "email",
                rule("email", "Email must be a valid email address"),
            );
        }
        if !(8..=32).contains(&self.password.chars().count()) {
            errors.add(
                "password",
                rule(
                    "length",
                    "Password must be between 8 and 32 characters long",
                ),
            );
        }
        for err in password_strength_failures(&self.password) {
            errors.add("password", err);
        }
        if let Err(err) = validate_role(&self.role) {
            errors.add("role", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 32,
        message = "Password must be between 8 and 32 characters long"
    ))]
    pub password: String,
}

/// Pull `token` out of a refresh body. An absent or unparsable body, or a
/// null or empty token, is `MissingRefreshToken`; any other non-string token
/// is `InvalidRefreshToken`.
fn refresh_token_from(body: &[u8]) -> AppResult<String> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| AppError::MissingRefreshToken)?;
    match value.get("token") {
        None | Some(Value::Null) => Err(AppError::MissingRefreshToken),
        Some(Value::String(token)) if token.is_empty() => Err(AppError::MissingRefreshToken),
        Some(Value::String(token)) => Ok(token.clone()),
        Some(_) => Err(AppError::InvalidRefreshToken),
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub session: Session,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    let len = name.trim().chars().count();
    if !(3..=30).contains(&len) {
        return Err(rule(
            "name_length",
            "Name must be between 3 and 30 characters long",
        ));
    }
    Ok(())
}

fn password_strength_failures(password: &str) -> Vec<ValidationError> {
    let checks: [(bool, &'static str, &'static str); 4] = [
        (
            password.chars().any(|c| c.is_ascii_lowercase()),
            "password_lowercase",
            "Password must include at least one lowercase letter",
        ),
        (
            password.chars().any(|c| c.is_ascii_uppercase()),
            "password_uppercase",
            "Password must include at least one uppercase letter",
        ),
        (
            password.chars().any(|c| c.is_ascii_digit()),
            "password_number",
            "Password must include at least one number",
        ),
        (
            !password.chars().all(|c| c.is_ascii_alphanumeric()),
            "password_special",
            "Password must include at least one special character",
        ),
    ];
    checks
        .into_iter()
        .filter(|(passed, _, _)| !passed)
        .map(|(_, code, message)| rule(code, message))
        .collect()
}

fn validate_role(role: &str) -> Result<(), ValidationError> {
    role.parse::<Role>()
        .map(|_| ())
        .map_err(|_| rule("role", "Role must be one of ADMIN, OFFICER, INVESTIGATOR"))
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let role = body
        .role
        .parse::<Role>()
        .map_err(|e| AppError::Validation(vec![e.to_string()]))?;

    let user = state
        .auth_service()
        .register(Registration {
            name: body.name.trim().to_string(),
            email: body.email,
            password: body.password,
            role,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            user,
        }),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let session = state
        .auth_service()
        .login(&body.email, &body.password)
        .await?;

    Ok(Json(LoginResponse {
        message: "Login successful",
        session,
    }))
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .auth_service()
        .get_user_by_id(claims.sub)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(Json(UserResponse { user }))
}

/// POST /auth/refresh-token — new access token; the refresh token is not rotated.
pub async fn refresh_token(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<AccessTokenResponse>> {
    let token = refresh_token_from(&body)?;
    let access_token = state.auth_service().refresh_access_token(&token).await?;
    Ok(Json(AccessTokenResponse { access_token }))
}

/// POST /auth/refresh-session — rotates both tokens.
pub async fn refresh_session(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<Session>> {
    let token = refresh_token_from(&body)?;
    let session = state.auth_service().rotate_session(&token).await?;
    Ok(Json(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::validated_json::validation_messages;

    fn register_request(password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Alice".to_string(),
            email: "ALICE@x.com".to_string(),
            password: password.to_string(),
            role: "OFFICER".to_string(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(register_request("Abcd123!").validate().is_ok());
    }

    #[test]
    fn weak_passwords_are_itemized() {
        for (password, expected) in [
            ("abcd123!", "uppercase"),
            ("ABCD123!", "lowercase"),
            ("Abcdefg!", "number"),
            ("Abcd1234", "special"),
            ("Ab1!", "between 8 and 32"),
        ] {
            let errors = register_request(password).validate().unwrap_err();
            let messages = validation_messages(&errors);
            assert!(
                messages.iter().any(|m| m.contains(expected)),
                "{password}: {messages:?}"
            );
        }
    }

    #[test]
    fn name_is_trimmed_before_length_check() {
        let mut req = register_request("Abcd123!");
        req.name = "  Al  ".to_string();
        assert!(req.validate().is_err());
        req.name = "  Ali  ".to_string();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn unknown_role_and_bad_email_are_reported_together() {
        let mut req = register_request("Abcd123!");
        req.role = "CHIEF".to_string();
        req.email = "not-an-email".to_string();
        let messages = validation_messages(&req.validate().unwrap_err());
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("valid email"));
        assert!(messages[1].contains("Role must be one of"));
    }

    #[test]
    fn login_request_rules() {
        let ok = LoginRequest {
            email: "alice@x.com".to_string(),
            password: "Abcd123!".to_string(),
        };
        assert!(ok.validate().is_ok());
        let short = LoginRequest {
            email: "alice@x.com".to_string(),
            password: "short".to_string(),
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn every_failing_password_rule_is_reported() {
        let errors = register_request("abcdefgh").validate().unwrap_err();
        let messages = validation_messages(&errors);
        assert_eq!(messages.len(), 3, "{messages:?}");
        assert!(messages[0].contains("uppercase"));
        assert!(messages[1].contains("number"));
        assert!(messages[2].contains("special"));

        let errors = register_request("abc").validate().unwrap_err();
        let messages = validation_messages(&errors);
        assert_eq!(messages.len(), 4, "{messages:?}");
        assert!(messages[0].contains("between 8 and 32"));
    }

    #[test]
    fn refresh_body_without_token_is_missing() {
        let bodies: [&[u8]; 6] = [
            b"",
            b"not json",
            b"{}",
            b"[]",
            br#"{"token":null}"#,
            br#"{"token":""}"#,
        ];
        for body in bodies {
            assert!(
                matches!(refresh_token_from(body), Err(AppError::MissingRefreshToken)),
                "{}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn refresh_body_with_non_string_token_is_invalid() {
        let bodies: [&[u8]; 3] = [
            br#"{"token":123}"#,
            br#"{"token":true}"#,
            br#"{"token":["a"]}"#,
        ];
        for body in bodies {
            assert!(matches!(
                refresh_token_from(body),
                Err(AppError::InvalidRefreshToken)
            ));
        }
        assert_eq!(refresh_token_from(br#"{"token":"abc"}"#).unwrap(), "abc");
    }
}
