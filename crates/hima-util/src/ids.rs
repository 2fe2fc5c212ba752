//! Strongly-typed identifiers for hima

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Identifier of a group, assigned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a user. Generated locally on registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random (v4) user id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a membership row (one per user per group)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Length of an invite code
pub const INVITE_CODE_LEN: usize = 8;

const INVITE_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Resolves bare `/join/...` paths so they parse like full links
const RELATIVE_LINK_BASE: &str = "http://localhost/";

/// Eight-character, upper-case alphanumeric code used to join a group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteCode(String);

impl InviteCode {
    /// Generate a random invite code, uniform over the alphabet
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..INVITE_CODE_LEN)
            .map(|_| INVITE_ALPHABET[rng.gen_range(0..INVITE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    fn is_valid(code: &str) -> bool {
        code.len() == INVITE_CODE_LEN
            && code.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
    }

    /// Parse user input. Lowercase input is accepted and upper-cased.
    pub fn parse(input: &str) -> Option<Self> {
        let code = input.trim().to_ascii_uppercase();
        Self::is_valid(&code).then_some(Self(code))
    }

    /// Extract the code from a `/join/XXXXXXXX` path or full invite URL.
    /// The segment after `join` must already be a well-formed code.
    pub fn from_join_path(path: &str) -> Option<Self> {
        let base = Url::parse(RELATIVE_LINK_BASE).ok()?;
        let url = base.join(path.trim()).ok()?;

        let mut segments = url.path_segments()?;
        segments.find(|segment| *segment == "join")?;
        let code = segments.next()?;
        Self::is_valid(code).then(|| Self(code.to_string()))
    }

    /// Accept either a bare code or an invite URL
    pub fn from_code_or_url(input: &str) -> Option<Self> {
        Self::from_join_path(input).or_else(|| Self::parse(input))
    }

    /// Build the shareable invite link for this code
    pub fn invite_url(&self, base_url: &str) -> String {
        format!("{}/join/{}", base_url.trim_end_matches('/'), self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_id_equality() {
        let id1 = GroupId::new("g-1");
        let id2 = GroupId::new("g-1");
        let id3 = GroupId::new("g-2");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn user_id_uniqueness() {
        let u1 = UserId::generate();
        let u2 = UserId::generate();
        assert_ne!(u1, u2);
        assert!(Uuid::parse_str(u1.as_str()).is_ok());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let group_id = GroupId::new("abc");
        let json = serde_json::to_string(&group_id).unwrap();
        assert_eq!(json, "\"abc\"");

        let parsed: UserId = serde_json::from_str("\"u-1\"").unwrap();
        assert_eq!(parsed, UserId::new("u-1"));
    }

    #[test]
    fn generated_invite_code_is_valid() {
        for _ in 0..50 {
            let code = InviteCode::generate();
            assert_eq!(code.as_str().len(), INVITE_CODE_LEN);
            assert_eq!(InviteCode::parse(code.as_str()), Some(code));
        }
    }

    #[test]
    fn invite_code_parse_uppercases() {
        assert_eq!(InviteCode::parse(" ab12cd34 ").unwrap().as_str(), "AB12CD34");
        assert!(InviteCode::parse("AB12CD3").is_none());
        assert!(InviteCode::parse("AB12CD34X").is_none());
        assert!(InviteCode::parse("AB12-D34").is_none());
    }

    #[test]
    fn invite_code_from_join_path() {
        let code = InviteCode::from_join_path("https://hima.example/join/XY7Q2KP0").unwrap();
        assert_eq!(code.as_str(), "XY7Q2KP0");

        let code = InviteCode::from_join_path("/join/XY7Q2KP0/?ref=share").unwrap();
        assert_eq!(code.as_str(), "XY7Q2KP0");

        assert!(InviteCode::from_join_path("/join/abc").is_none());
        assert!(InviteCode::from_join_path("/join/XY7Q2KP0EXTRA").is_none());
        assert!(InviteCode::from_join_path("/groups/XY7Q2KP0").is_none());
        assert!(InviteCode::from_join_path("https://[::1/join/XY7Q2KP0").is_none());
        assert!(InviteCode::from_join_path("XY7Q2KP0").is_none());
    }

    #[test]
    fn generated_invite_codes_use_whole_alphabet_at_every_position() {
        let mut seen = vec![std::collections::HashSet::new(); INVITE_CODE_LEN];
        for _ in 0..5000 {
            let code = InviteCode::generate();
            for (position, symbol) in code.as_str().bytes().enumerate() {
                seen[position].insert(symbol);
            }
        }

        for (position, symbols) in seen.iter().enumerate() {
            assert_eq!(symbols.len(), INVITE_ALPHABET.len(), "position {}", position);
        }
    }

    #[test]
    fn invite_url_round_trips_through_join_path() {
        let code = InviteCode::parse("XY7Q2KP0").unwrap();
        let url = code.invite_url("https://hima.example/");
        assert_eq!(url, "https://hima.example/join/XY7Q2KP0");
        assert_eq!(InviteCode::from_code_or_url(&url), Some(code));
    }
}
