// components/track_primitives/src/session.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid session id: {0:?}")]
pub struct SessionIdError(String);

/// Identifier of one download request
///
/// Backed by a random v4 UUID. Collisions are negligible and nothing is
/// coordinated across processes. Parsing only accepts the UUID form, so a
/// session id taken from a request can be joined onto a directory safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, SessionIdError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| SessionIdError(s.to_string()))
    }

}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[test]
    fn generated_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn display_round_trips_through_parse() {
        let id = SessionId::generate();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[rstest]
    #[case("")]
    #[case("..")]
    #[case("../../etc/passwd")]
    #[case("spotify_download_1234")]
    #[case("123e4567-e89b-12d3-a456-42661417400/")]
    fn rejects_anything_but_a_uuid(#[case] input: &str) {
        assert_matches!(SessionId::parse(input), Err(SessionIdError(_)));
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = SessionId::parse("123e4567-e89b-12d3-a456-426614174000").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"123e4567-e89b-12d3-a456-426614174000\"");
    }
}
