//! Ordered, duplicate-free scope sets.

use serde::{Deserialize, Serialize};

use super::Scope;
use crate::error::UnknownVariant;

/// Scopes in request order, each at most once.
///
/// On the wire this is a single space-separated string. An empty set is a
/// valid value (no scope granted); an absent `scope` field is represented by
/// `Option<Scopes>` at the request layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scopes(Vec<Scope>);

impl Scopes {
    /// An empty scope set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a space-separated scope list, dropping repeats.
    pub fn parse(raw: &str) -> Result<Self, UnknownVariant> {
        raw.split_ascii_whitespace().map(str::parse::<Scope>).collect()
    }

    /// Append a scope unless already present.
    pub fn insert(&mut self, scope: Scope) {
        if !self.0.contains(&scope) {
            self.0.push(scope);
        }
    }

    #[must_use]
    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }

    /// Every scope here is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.iter().all(|scope| other.contains(scope))
    }

    /// Space-separated wire form.
    #[must_use]
    pub fn to_wire(&self) -> String {
        self.iter().map(Scope::as_str).collect::<Vec<_>>().join(" ")
    }
}

impl FromIterator<Scope> for Scopes {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        let mut scopes = Self::new();
        for scope in iter {
            scopes.insert(scope);
        }
        scopes
    }
}

impl From<Vec<Scope>> for Scopes {
    fn from(value: Vec<Scope>) -> Self {
        value.into_iter().collect()
    }
}

impl std::str::FromStr for Scopes {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Scopes {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Scopes> for String {
    fn from(value: Scopes) -> Self {
        value.to_wire()
    }
}

impl std::fmt::Display for Scopes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_order_and_drops_duplicates() {
        let scopes = Scopes::parse("create  profile create media").unwrap();
        assert_eq!(scopes.to_wire(), "create profile media");
        assert_eq!(scopes.len(), 3);
    }

    #[test]
    fn test_empty_is_valid() {
        let scopes = Scopes::parse("   ").unwrap();
        assert!(scopes.is_empty());
        assert_eq!(scopes.to_wire(), "");
    }

    #[test]
    fn test_unknown_scope_rejected() {
        assert!(Scopes::parse("create superuser").is_err());
    }

    #[test]
    fn test_subset() {
        let granted = Scopes::parse("profile create update").unwrap();
        assert!(Scopes::parse("create").unwrap().is_subset_of(&granted));
        assert!(!Scopes::parse("delete").unwrap().is_subset_of(&granted));
        assert!(Scopes::default().is_subset_of(&granted));
    }

    #[test]
    fn test_serde_as_string() {
        let scopes: Scopes = serde_json::from_str(r#""read create""#).unwrap();
        assert_eq!(serde_json::to_string(&scopes).unwrap(), r#""read create""#);
    }
}
