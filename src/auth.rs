//! Credential providers.
//!
//! Each provider encapsulates one authentication scheme and stamps outgoing
//! request headers with it. Providers are immutable once constructed and
//! reject empty mandatory secrets at construction time.

use std::fmt;

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::error::{Result, SonarError};

/// Header carrying a server passcode.
pub const PASSCODE_HEADER: &str = "x-sonar-passcode";

/// Which scheme a provider implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Bearer,
    Basic,
    Passcode,
    None,
}

/// Stamps outgoing requests with one authentication scheme.
///
/// `apply_auth` never performs I/O and never fails; all checking happens
/// when the provider is constructed.
pub trait AuthProvider: fmt::Debug + Send + Sync {
    /// Add this provider's headers, leaving every other header untouched.
    fn apply_auth(&self, headers: &mut HeaderMap);

    fn auth_type(&self) -> AuthType;
}

/// `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct BearerAuth {
    value: HeaderValue,
}

impl BearerAuth {
    /// # Errors
    ///
    /// Returns a validation error if `token` is empty or not a valid header value.
    pub fn new(token: impl AsRef<str>) -> Result<Self> {
        let token = token.as_ref();
        if token.is_empty() {
            return Err(SonarError::validation("token", "Token is required"));
        }
        Ok(Self {
            value: sensitive_value(&format!("Bearer {token}"), "token")?,
        })
    }
}

impl AuthProvider for BearerAuth {
    fn apply_auth(&self, headers: &mut HeaderMap) {
        headers.insert(AUTHORIZATION, self.value.clone());
    }

    fn auth_type(&self) -> AuthType {
        AuthType::Bearer
    }
}

/// `Authorization: Basic <base64(username:password)>`.
///
/// An empty password is allowed: Sonar accepts a user token passed as the
/// username with no password.
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    value: HeaderValue,
}

impl BasicAuth {
    /// # Errors
    ///
    /// Returns a validation error if `username` is empty.
    pub fn new(username: impl Into<String>, password: Option<&str>) -> Result<Self> {
        let username = username.into();
        if username.is_empty() {
            return Err(SonarError::validation("username", "Username is required"));
        }
        let encoded = encode_basic(&username, password.unwrap_or(""));
        Ok(Self {
            value: sensitive_value(&format!("Basic {encoded}"), "password")?,
            username,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl AuthProvider for BasicAuth {
    fn apply_auth(&self, headers: &mut HeaderMap) {
        headers.insert(AUTHORIZATION, self.value.clone());
    }

    fn auth_type(&self) -> AuthType {
        AuthType::Basic
    }
}

/// `X-Sonar-Passcode: <passcode>`, used by system endpoints.
#[derive(Clone)]
pub struct PasscodeAuth {
    value: HeaderValue,
}

impl PasscodeAuth {
    /// # Errors
    ///
    /// Returns a validation error if `passcode` is empty.
    pub fn new(passcode: impl AsRef<str>) -> Result<Self> {
        let passcode = passcode.as_ref();
        if passcode.is_empty() {
            return Err(SonarError::validation("passcode", "Passcode is required"));
        }
        Ok(Self {
            value: sensitive_value(passcode, "passcode")?,
        })
    }
}

impl AuthProvider for PasscodeAuth {
    fn apply_auth(&self, headers: &mut HeaderMap) {
        headers.insert(HeaderName::from_static(PASSCODE_HEADER), self.value.clone());
    }

    fn auth_type(&self) -> AuthType {
        AuthType::Passcode
    }
}

/// Sends no credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl AuthProvider for NoAuth {
    fn apply_auth(&self, _headers: &mut HeaderMap) {}

    fn auth_type(&self) -> AuthType {
        AuthType::None
    }
}

// Secrets stay out of Debug output.

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth").finish_non_exhaustive()
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for PasscodeAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasscodeAuth").finish_non_exhaustive()
    }
}

/// Base64 of the UTF-8 bytes of `username:password`.
pub fn encode_basic(username: &str, password: &str) -> String {
    let credentials = format!("{username}:{password}");
    base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes())
}

fn sensitive_value(value: &str, field: &str) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value).map_err(|_| {
        SonarError::validation(field, format!("{field} contains characters not allowed in a header"))
    })?;
    header.set_sensitive(true);
    Ok(header)
}
