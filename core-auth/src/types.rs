use crate::error::{AuthError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Identifier of one sign-in attempt.
///
/// Attempt ids are minted by the state machine in strictly increasing order.
/// A provider callback tagged with an id other than the outstanding one is a
/// stale completion and is dropped.
///
/// # Examples
///
/// ```
/// use core_auth::AttemptId;
///
/// let first = AttemptId::from_raw(1);
/// let second = AttemptId::from_raw(2);
/// assert!(first < second);
/// assert_eq!(second.to_string(), "attempt-2");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}

/// Provider-internal session state needed to refresh tokens.
///
/// The core never interprets these bytes; it only carries them through
/// persistence and hands them back to the provider. Serialized as base64.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionHandle(Vec<u8>);

impl SessionHandle {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionHandle([{} bytes])", self.0.len())
    }
}

impl Serialize for SessionHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for SessionHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(SessionHandle)
            .map_err(serde::de::Error::custom)
    }
}

/// Identity fields reported by the provider for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    /// Opaque provider-assigned identifier
    pub user_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            email: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Tokens exactly as the provider handed them over.
///
/// Either field may be missing; callers validate before building a record.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl RawTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// Access token only; used by providers that do not rotate refresh tokens.
    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: None,
        }
    }
}

impl fmt::Debug for RawTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawTokens")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Result of a successful token refresh.
///
/// `refresh_token` is `None` when the provider did not rotate it.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("access_token", &"[REDACTED]")
            .field("rotated_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Header names used when attaching credentials to outbound requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderNames {
    /// Header announcing which identity provider issued the token
    pub token_type: String,
    /// Value sent in the `token_type` header
    pub token_type_value: String,
    pub access_token: String,
    pub authorization_code: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            token_type: "X-token-type".to_string(),
            token_type_value: "GoogleToken".to_string(),
            access_token: "access_token".to_string(),
            authorization_code: "authorization_code".to_string(),
        }
    }
}

/// Snapshot of a signed-in user's tokens and profile fields.
///
/// A record is valid only when `user_id`, `access_token` and `refresh_token`
/// are all non-empty. Records are never mutated in place: a refresh produces a
/// new record through [`CredentialRecord::with_refreshed_tokens`].
///
/// # Security
///
/// The `Debug` implementation redacts both tokens and the server auth code.
///
/// # Examples
///
/// ```
/// use core_auth::{CredentialRecord, UserProfile};
///
/// let record = CredentialRecord::new(
///     UserProfile::new("u1").with_email("u1@example.com"),
///     "a1",
///     "r1",
/// );
/// assert!(record.is_valid());
/// assert_eq!(record.ui_display_name(), Some("u1@example.com"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    user: UserProfile,
    access_token: String,
    refresh_token: String,
    server_auth_code: Option<String>,
    session_handle: Option<SessionHandle>,
}

impl CredentialRecord {
    pub fn new(
        user: UserProfile,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            user,
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            server_auth_code: None,
            session_handle: None,
        }
    }

    /// Attach the one-time server auth code from an interactive sign-in.
    pub fn with_server_auth_code(mut self, code: Option<String>) -> Self {
        self.server_auth_code = code.filter(|c| !c.is_empty());
        self
    }

    pub fn with_session_handle(mut self, handle: Option<SessionHandle>) -> Self {
        self.session_handle = handle;
        self
    }

    pub fn user(&self) -> &UserProfile {
        &self.user
    }

    pub fn user_id(&self) -> &str {
        &self.user.user_id
    }

    pub fn username(&self) -> Option<&str> {
        self.user.username.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.user.email.as_deref()
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn server_auth_code(&self) -> Option<&str> {
        self.server_auth_code.as_deref()
    }

    pub fn session_handle(&self) -> Option<&SessionHandle> {
        self.session_handle.as_ref()
    }

    /// Name to show in the UI: the email when known, else the username.
    pub fn ui_display_name(&self) -> Option<&str> {
        self.email().or_else(|| self.username())
    }

    /// Check the validity invariant, naming the first missing field.
    pub fn validate(&self) -> Result<()> {
        let missing = if self.user.user_id.is_empty() {
            "user_id"
        } else if self.access_token.is_empty() {
            "access_token"
        } else if self.refresh_token.is_empty() {
            "refresh_token"
        } else {
            return Ok(());
        };

        Err(AuthError::IncompleteCredentials {
            missing: missing.to_string(),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Derive the record that replaces this one after a refresh.
    ///
    /// Identity fields, the server auth code and the session handle carry
    /// over unchanged. The refresh token is kept when the provider did not
    /// rotate it.
    pub fn with_refreshed_tokens(&self, tokens: RefreshedTokens) -> Self {
        Self {
            user: self.user.clone(),
            access_token: tokens.access_token,
            refresh_token: tokens
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| self.refresh_token.clone()),
            server_auth_code: self.server_auth_code.clone(),
            session_handle: self.session_handle.clone(),
        }
    }

    /// Header set to attach to an authenticated outbound request.
    ///
    /// The authorization code header is present only when the record still
    /// carries a server auth code.
    pub fn request_headers(&self, names: &HeaderNames) -> Vec<(String, String)> {
        let mut headers = vec![
            (names.token_type.clone(), names.token_type_value.clone()),
            (names.access_token.clone(), self.access_token.clone()),
        ];

        if let Some(code) = &self.server_auth_code {
            headers.push((names.authorization_code.clone(), code.clone()));
        }

        headers
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("user_id", &self.user.user_id)
            .field("username", &self.user.username)
            .field("email", &self.user.email)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field(
                "server_auth_code",
                &self.server_auth_code.as_ref().map(|_| "[REDACTED]"),
            )
            .field("session_handle", &self.session_handle)
            .finish()
    }
}

/// Sign-in state of the single provider.
///
/// # State Transitions
///
/// ```text
/// SignedOut -> SigningIn -> SignedIn
///     ^            |            |
///     +------------+------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SignInState {
    #[default]
    SignedOut,
    /// An attempt is outstanding and its completion has not arrived yet.
    SigningIn {
        attempt: AttemptId,
        /// `true` for silent restores that need no user interaction
        auto_sign_in: bool,
    },
    SignedIn {
        record: CredentialRecord,
        auto_sign_in: bool,
    },
}

impl SignInState {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, SignInState::SignedIn { .. })
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, SignInState::SigningIn { .. })
    }

    pub fn credentials(&self) -> Option<&CredentialRecord> {
        match self {
            SignInState::SignedIn { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Button shown for this state.
    pub fn button_state(&self) -> ButtonState {
        if self.is_signed_in() {
            ButtonState::SignOut
        } else {
            ButtonState::SignIn
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignInState::SignedOut => "SignedOut",
            SignInState::SigningIn { .. } => "SigningIn",
            SignInState::SignedIn { .. } => "SignedIn",
        }
    }
}

/// What the sign-in button should offer. Always derived from [`SignInState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonState {
    SignIn,
    SignOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CredentialRecord {
        CredentialRecord::new(
            UserProfile::new("u1")
                .with_username("User One")
                .with_email("u1@example.com"),
            "a1",
            "r1",
        )
        .with_server_auth_code(Some("code-1".to_string()))
        .with_session_handle(Some(SessionHandle::new(vec![1, 2, 3])))
    }

    #[test]
    fn test_validate_names_missing_field() {
        let missing_user = CredentialRecord::new(UserProfile::new(""), "a", "r");
        assert_eq!(
            missing_user.validate(),
            Err(AuthError::IncompleteCredentials {
                missing: "user_id".to_string()
            })
        );

        let missing_refresh = CredentialRecord::new(UserProfile::new("u1"), "a", "");
        assert!(matches!(
            missing_refresh.validate(),
            Err(AuthError::IncompleteCredentials { missing }) if missing == "refresh_token"
        ));

        assert!(record().is_valid());
    }

    #[test]
    fn test_refresh_preserves_identity_and_auth_code() {
        let original = record();
        let refreshed = original.with_refreshed_tokens(RefreshedTokens {
            access_token: "a2".to_string(),
            refresh_token: Some("r2".to_string()),
        });

        assert_eq!(refreshed.access_token(), "a2");
        assert_eq!(refreshed.refresh_token(), "r2");
        assert_eq!(refreshed.user(), original.user());
        assert_eq!(refreshed.server_auth_code(), Some("code-1"));
        assert_eq!(refreshed.session_handle(), original.session_handle());
    }

    #[test]
    fn test_refresh_keeps_refresh_token_when_not_rotated() {
        let refreshed = record().with_refreshed_tokens(RefreshedTokens {
            access_token: "a2".to_string(),
            refresh_token: None,
        });
        assert_eq!(refreshed.refresh_token(), "r1");
    }

    #[test]
    fn test_ui_display_name_prefers_email() {
        assert_eq!(record().ui_display_name(), Some("u1@example.com"));

        let no_email = CredentialRecord::new(UserProfile::new("u1").with_username("Uno"), "a", "r");
        assert_eq!(no_email.ui_display_name(), Some("Uno"));

        let anonymous = CredentialRecord::new(UserProfile::new("u1"), "a", "r");
        assert_eq!(anonymous.ui_display_name(), None);
    }

    #[test]
    fn test_request_headers_with_auth_code() {
        let headers = record().request_headers(&HeaderNames::default());
        assert_eq!(
            headers,
            vec![
                ("X-token-type".to_string(), "GoogleToken".to_string()),
                ("access_token".to_string(), "a1".to_string()),
                ("authorization_code".to_string(), "code-1".to_string()),
            ]
        );
    }

    #[test]
    fn test_request_headers_omit_absent_auth_code() {
        let record = CredentialRecord::new(UserProfile::new("u1"), "a1", "r1")
            .with_server_auth_code(Some(String::new()));
        let headers = record.request_headers(&HeaderNames::default());

        assert_eq!(headers.len(), 2);
        assert!(headers.iter().all(|(name, _)| name != "authorization_code"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", record());
        assert!(rendered.contains("u1"));
        assert!(!rendered.contains("a1"));
        assert!(!rendered.contains("r1"));
        assert!(!rendered.contains("code-1"));
        assert!(rendered.contains("3 bytes"));
    }

    #[test]
    fn test_session_handle_serializes_as_base64() {
        let handle = SessionHandle::new(b"opaque".to_vec());
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, "\"b3BhcXVl\"");

        let back: SessionHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
        assert!(serde_json::from_str::<SessionHandle>("\"not base64!\"").is_err());
    }

    #[test]
    fn test_button_state_follows_sign_in_state() {
        assert_eq!(SignInState::SignedOut.button_state(), ButtonState::SignIn);
        assert_eq!(
            SignInState::SigningIn {
                attempt: AttemptId::from_raw(1),
                auto_sign_in: false
            }
            .button_state(),
            ButtonState::SignIn
        );
        assert_eq!(
            SignInState::SignedIn {
                record: record(),
                auto_sign_in: true
            }
            .button_state(),
            ButtonState::SignOut
        );
    }

    #[test]
    fn test_attempt_ids_increase() {
        let first = AttemptId::from_raw(7);
        assert!(first.next() > first);
        assert_eq!(first.next().value(), 8);
    }
}
