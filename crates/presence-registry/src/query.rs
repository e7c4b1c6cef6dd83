//! Presence queries
//!
//! A query is an exact-match filter over the published attributes. Unset
//! fields match anything. Consumers may also write queries in the filter
//! syntax used by service registries:
//!
//! ```text
//! (&(userId=alice)(disabled=false)(systemUser=true))
//! (userId=alice)
//! (*)
//! ```

use crate::error::{RegistryError, Result};
use presence_types::{PresenceAttributes, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const USER_ID: &str = "userId";
const DISABLED: &str = "disabled";
const SYSTEM_USER: &str = "systemUser";

/// Exact-match filter over presence attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceQuery {
    pub user_id: Option<UserId>,
    pub disabled: Option<bool>,
    pub system_user: Option<bool>,
}

impl PresenceQuery {
    /// Query matching every record
    pub fn any() -> Self {
        Self::default()
    }

    /// Query matching all records of one user
    pub fn for_user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Query matching exactly the given attributes
    pub fn exact(attributes: &PresenceAttributes) -> Self {
        Self {
            user_id: Some(attributes.user_id.clone()),
            disabled: Some(attributes.disabled),
            system_user: Some(attributes.system_user),
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn system_user(mut self, system_user: bool) -> Self {
        self.system_user = Some(system_user);
        self
    }

    pub fn matches(&self, attributes: &PresenceAttributes) -> bool {
        self.user_id
            .as_ref()
            .map_or(true, |id| *id == attributes.user_id)
            && self.disabled.map_or(true, |d| d == attributes.disabled)
            && self
                .system_user
                .map_or(true, |s| s == attributes.system_user)
    }

    /// Parse a filter string such as `(&(userId=alice)(disabled=false))`.
    pub fn parse(filter: &str) -> Result<Self> {
        let inner = strip_parens(filter.trim())?;
        let mut query = Self::default();

        if inner == "*" {
            return Ok(query);
        }

        let Some(mut rest) = inner.strip_prefix('&') else {
            query.apply_term(inner)?;
            return Ok(query);
        };

        rest = rest.trim_start();
        if rest.is_empty() {
            return Err(invalid(filter, "empty conjunction"));
        }

        while !rest.is_empty() {
            if !rest.starts_with('(') {
                return Err(invalid(filter, "expected '('"));
            }
            let end = rest
                .find(')')
                .ok_or_else(|| invalid(filter, "unbalanced parentheses"))?;
            query.apply_term(&rest[1..end])?;
            rest = rest[end + 1..].trim_start();
        }

        Ok(query)
    }

    fn apply_term(&mut self, term: &str) -> Result<()> {
        let (key, value) = term
            .split_once('=')
            .ok_or_else(|| invalid(term, "expected key=value"))?;
        let key = key.trim();
        let value = value.trim();

        if value.contains('(') || value.contains(')') {
            return Err(invalid(term, "unexpected parenthesis in value"));
        }

        match key {
            USER_ID => {
                if self.user_id.is_some() {
                    return Err(invalid(term, "duplicate userId"));
                }
                self.user_id = Some(UserId::new(value));
            }
            DISABLED => {
                if self.disabled.is_some() {
                    return Err(invalid(term, "duplicate disabled"));
                }
                self.disabled = Some(parse_bool(term, value)?);
            }
            SYSTEM_USER => {
                if self.system_user.is_some() {
                    return Err(invalid(term, "duplicate systemUser"));
                }
                self.system_user = Some(parse_bool(term, value)?);
            }
            other => {
                return Err(invalid(term, &format!("unknown attribute '{}'", other)));
            }
        }
        Ok(())
    }
}

impl FromStr for PresenceQuery {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PresenceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut terms = Vec::new();
        if let Some(ref id) = self.user_id {
            terms.push(format!("({}={})", USER_ID, id));
        }
        if let Some(disabled) = self.disabled {
            terms.push(format!("({}={})", DISABLED, disabled));
        }
        if let Some(system_user) = self.system_user {
            terms.push(format!("({}={})", SYSTEM_USER, system_user));
        }

        match terms.len() {
            0 => f.write_str("(*)"),
            1 => f.write_str(&terms[0]),
            _ => write!(f, "(&{})", terms.concat()),
        }
    }
}

fn strip_parens(filter: &str) -> Result<&str> {
    filter
        .strip_prefix('(')
        .and_then(|f| f.strip_suffix(')'))
        .map(str::trim)
        .ok_or_else(|| invalid(filter, "filter must be enclosed in parentheses"))
}

fn parse_bool(term: &str, value: &str) -> Result<bool> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(invalid(term, "expected true or false"))
    }
}

fn invalid(input: &str, reason: &str) -> RegistryError {
    RegistryError::InvalidQuery(format!("{}: {}", reason, input))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(user: &str, disabled: bool, system_user: bool) -> PresenceAttributes {
        PresenceAttributes {
            user_id: UserId::new(user),
            disabled,
            system_user,
        }
    }

    #[test]
    fn test_parse_conjunction() {
        let query = PresenceQuery::parse("(&(userId=test)(disabled=false)(systemUser=true))").unwrap();

        assert_eq!(query.user_id, Some(UserId::new("test")));
        assert_eq!(query.disabled, Some(false));
        assert_eq!(query.system_user, Some(true));
        assert!(query.matches(&attributes("test", false, true)));
        assert!(!query.matches(&attributes("test", true, true)));
    }

    #[test]
    fn test_parse_single_term() {
        let query: PresenceQuery = "(userId=alice)".parse().unwrap();

        assert_eq!(query, PresenceQuery::for_user("alice"));
        assert!(query.matches(&attributes("alice", true, false)));
        assert!(!query.matches(&attributes("bob", true, false)));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for filter in [
            "userId=alice",
            "(&)",
            "(&(userId=alice)",
            "(&(userId=alice)(userId=bob))",
            "(disabled=maybe)",
            "(group=admins)",
        ] {
            assert!(
                matches!(PresenceQuery::parse(filter), Err(RegistryError::InvalidQuery(_))),
                "accepted {}",
                filter
            );
        }
    }

    #[test]
    fn test_display_parses_back() {
        let query = PresenceQuery::for_user("alice").disabled(true);
        let rendered = query.to_string();

        assert_eq!(rendered, "(&(userId=alice)(disabled=true))");
        assert_eq!(PresenceQuery::parse(&rendered).unwrap(), query);
    }

    #[test]
    fn test_any_matches_everything() {
        assert!(PresenceQuery::any().matches(&attributes("anyone", true, true)));
    }

    #[test]
    fn test_match_all_parses_back() {
        let rendered = PresenceQuery::any().to_string();

        assert_eq!(rendered, "(*)");
        assert_eq!(PresenceQuery::parse(&rendered).unwrap(), PresenceQuery::any());
        assert_eq!(PresenceQuery::parse("( * )").unwrap(), PresenceQuery::any());
    }
}
