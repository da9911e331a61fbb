// crates/chitfund-core/src/identity.rs

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::ChitFundError;
use crate::traits::IdentityProvider;

/// An account identity, typically a hex address such as `0xAbC...`.
///
/// The original spelling is kept for display, but comparison, ordering and
/// hashing are ASCII case-insensitive: `0xABC` and `0xabc` are the same
/// account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Build an identity from a raw string, trimming surrounding whitespace.
    ///
    /// # Errors
    /// Returns `ChitFundError::InvalidParameters` if the string is blank.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ChitFundError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ChitFundError::invalid("identity", "must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The identity as originally supplied.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against another identity.
    pub fn matches(&self, other: &Identity) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.0.bytes().map(|b| b.to_ascii_lowercase());
        let rhs = other.0.bytes().map(|b| b.to_ascii_lowercase());
        lhs.cmp(rhs)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = ChitFundError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Identity::new(raw)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0
    }
}

impl std::str::FromStr for Identity {
    type Err = ChitFundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identity::new(s)
    }
}

/// An identity provider with a fixed (possibly absent) account.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<Identity>);

impl StaticIdentity {
    pub fn new(identity: Option<Identity>) -> Self {
        Self(identity)
    }

    /// A provider with no connected account.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_case_insensitive_equality() {
        let a = Identity::new("0xAbCdEf").unwrap();
        let b = Identity::new("0xabcdef").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_keeps_original_spelling() {
        let id = Identity::new("  0xAbC ").unwrap();
        assert_eq!(id.as_str(), "0xAbC");
        assert_eq!(id.to_string(), "0xAbC");
    }

    #[test]
    fn test_static_identity() {
        let provider = StaticIdentity::new(Some(Identity::new("0xA").unwrap()));
        assert_eq!(provider.current_identity().unwrap().as_str(), "0xA");
        assert!(StaticIdentity::anonymous().current_identity().is_none());
    }

    #[test]
    fn test_deserialize_validates() {
        let id: Identity = serde_json::from_str("\"0xAb\"").unwrap();
        assert_eq!(id.as_str(), "0xAb");
        assert!(serde_json::from_str::<Identity>("\"  \"").is_err());
    }

    #[test]
    fn test_blank_rejected() {
        assert!(matches!(
            Identity::new("   "),
            Err(ChitFundError::InvalidParameters { field: "identity", .. })
        ));
    }
}
