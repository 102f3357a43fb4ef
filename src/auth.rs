use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use uuid::Uuid;

/// Username and password as posted by the login and register forms.
#[derive(Deserialize)]
pub struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

impl Credentials {
    #[cfg(test)]
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn user(&self) -> &str {
        self.username.trim()
    }

    pub fn pass(&self) -> &str {
        &self.password
    }

    pub fn is_complete(&self) -> bool {
        !self.user().is_empty() && !self.pass().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Something that can log in: a stable id, a name and a password check.
pub trait Principal {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
    fn check_password(&self, pass: &str) -> bool;
}

/// Salted password hash, stored as `salt$hex(sha256(salt:password))`.
pub struct PwHash(String);

impl PwHash {
    pub fn new(pass: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = digest(&salt, pass);
        Self(format!("{salt}${digest}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn verify(stored: &str, pass: &str) -> bool {
        let Some((salt, expected)) = stored.split_once('$') else {
            return false;
        };

        constant_time_eq(digest(salt, pass).as_bytes(), expected.as_bytes())
    }
}

fn digest(salt: &str, pass: &str) -> String {
    sha256::digest(format!("{salt}:{pass}"))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for SessionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s).map(Self).map_err(|_| ())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_verifies_only_the_right_password() {
        let hash = PwHash::new("hunter2");

        assert!(!hash.as_str().contains("hunter2"));
        assert!(PwHash::verify(hash.as_str(), "hunter2"));
        assert!(!PwHash::verify(hash.as_str(), "hunter3"));
        assert!(!PwHash::verify(hash.as_str(), ""));
    }

    #[test]
    fn hashes_are_salted() {
        let a = PwHash::new("same");
        let b = PwHash::new("same");

        assert_ne!(a.as_str(), b.as_str());
        assert!(PwHash::verify(b.as_str(), "same"));
    }

    #[test]
    fn unsalted_hash_never_verifies() {
        assert!(!PwHash::verify(&sha256::digest("pass"), "pass"));
    }

    #[test]
    fn session_id_roundtrip() {
        let id = SessionId::new();

        assert_eq!(id.to_string().parse::<SessionId>(), Ok(id));
        assert!("not-a-session".parse::<SessionId>().is_err());
    }

    #[test]
    fn credentials_need_both_fields() {
        assert!(Credentials::new("alice", "pw").is_complete());
        assert!(!Credentials::new("  ", "pw").is_complete());
        assert!(!Credentials::new("alice", "").is_complete());
        assert_eq!(Credentials::new(" alice ", "pw").user(), "alice");
    }
}
