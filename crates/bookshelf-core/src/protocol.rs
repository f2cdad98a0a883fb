// Wire types exchanged with the book backend, plus the client-side checks
// that run before any of them is sent.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Bcrypt on the backend truncates beyond this many bytes, so it rejects
/// longer passwords outright.
pub const MAX_PASSWORD_LEN: usize = 72;
pub const MIN_PASSWORD_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A request failed a client-side check and was never sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::new("email", "Email is required"));
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(ValidationError::new("email", "Invalid email format"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Background questionnaire
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalBackground {
    ComputerScience,
    ElectricalEngineering,
    MechanicalEngineering,
    #[default]
    Other,
}

impl FromStr for ExperienceLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(ValidationError::new(
                "experience",
                format!("Invalid experience level `{other}`"),
            )),
        }
    }
}

impl FromStr for TechnicalBackground {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "computer_science" => Ok(Self::ComputerScience),
            "electrical_engineering" => Ok(Self::ElectricalEngineering),
            "mechanical_engineering" => Ok(Self::MechanicalEngineering),
            "other" => Ok(Self::Other),
            other => Err(ValidationError::new(
                "technicalBackground",
                format!("Invalid technical background `{other}`"),
            )),
        }
    }
}

/// The backend stores these columns as nullable; an explicit `null` means
/// "use the default", same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// The signed-in user as reported by the profile endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub software_experience: ExperienceLevel,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hardware_experience: ExperienceLevel,
    #[serde(default, deserialize_with = "null_as_default")]
    pub technical_background: TechnicalBackground,
    #[serde(default)]
    pub primary_programming_language: Option<String>,
    #[serde(default)]
    pub background_completed: bool,
    /// Server timestamps, passed through verbatim.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl UserProfile {
    /// "First Last" when either name is known, otherwise the email.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.email.clone()
        } else {
            parts.join(" ")
        }
    }
}

// ---------------------------------------------------------------------------
// Auth requests
// ---------------------------------------------------------------------------

/// Registration fields plus the background questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub software_experience: ExperienceLevel,
    pub hardware_experience: ExperienceLevel,
    pub technical_background: TechnicalBackground,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_programming_language: Option<String>,
}

impl SignUpRequest {
    /// A request with the questionnaire left at its defaults.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
            software_experience: ExperienceLevel::default(),
            hardware_experience: ExperienceLevel::default(),
            technical_background: TechnicalBackground::default(),
            primary_programming_language: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        let len = self.password.chars().count();
        if len == 0 {
            return Err(ValidationError::new("password", "Password is required"));
        }
        if len < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(ValidationError::new(
                "password",
                format!("Password must be no more than {MAX_PASSWORD_LEN} characters"),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Login only checks presence; strength rules apply at signup.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ValidationError::new("password", "Password is required"));
        }
        Ok(())
    }
}

/// Subset of the questionnaire to change. Absent fields are left alone.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_experience: Option<ExperienceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_experience: Option<ExperienceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_background: Option<TechnicalBackground>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_programming_language: Option<String>,
}

impl BackgroundUpdate {
    pub fn is_empty(&self) -> bool {
        self.software_experience.is_none()
            && self.hardware_experience.is_none()
            && self.technical_background.is_none()
            && self.primary_programming_language.is_none()
    }
}

// ---------------------------------------------------------------------------
// Auth responses
// ---------------------------------------------------------------------------

/// The `session` object as the backend sends it. Different endpoints have
/// filled either `token` or `id`; both are kept until normalization.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawSession {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl RawSession {
    /// Collapse into the one canonical identifier, preferring `token`.
    /// Returns `None` when neither field carries a non-empty value.
    pub fn normalize(self) -> Option<AuthSession> {
        let token = [self.token, self.id]
            .into_iter()
            .flatten()
            .find(|v| !v.trim().is_empty())?;
        Some(AuthSession {
            token,
            expires_at: self.expires_at,
        })
    }
}

/// Body of a successful signup or login.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawAuthResponse {
    pub user: UserProfile,
    #[serde(default)]
    pub session: Option<RawSession>,
}

/// A normalized bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Signup/login result after normalization at the client boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthGrant {
    pub user: UserProfile,
    pub session: AuthSession,
}

// ---------------------------------------------------------------------------
// Chat and search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub query: String,
    pub user_id: Option<String>,
    pub selected_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    pub chunk_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
}

impl SearchRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.query.trim().is_empty() {
            return Err(ValidationError::new(
                "query",
                "Search query is required and must be a non-empty string",
            ));
        }
        Ok(())
    }
}

/// One retrieved passage of book content.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentChunk {
    pub page_content: String,
    pub chapter_title: String,
    pub url_slug: String,
    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub chunk_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<DocumentChunk>,
}
