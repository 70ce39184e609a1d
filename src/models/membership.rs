use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

use super::MediaKind;

/// Catalog-provider id of a movie or show
pub type ResourceId = u64;

/// Identity of the caller, issued by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a user-named list
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(String);

impl ListId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which collection a membership belongs to
///
/// Wire format is `watchlist` or `list:<list-id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CollectionKind {
    Watchlist,
    List(ListId),
}

const LIST_PREFIX: &str = "list:";

impl Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionKind::Watchlist => f.write_str("watchlist"),
            CollectionKind::List(id) => write!(f, "{}{}", LIST_PREFIX, id.as_str()),
        }
    }
}

impl FromStr for CollectionKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "watchlist" {
            return Ok(CollectionKind::Watchlist);
        }
        match s.strip_prefix(LIST_PREFIX) {
            Some(id) if !id.trim().is_empty() => Ok(CollectionKind::List(ListId::new(id))),
            _ => Err(AppError::InvalidInput(format!(
                "Unknown collection: {} (expected 'watchlist' or 'list:<id>')",
                s
            ))),
        }
    }
}

impl TryFrom<String> for CollectionKind {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CollectionKind> for String {
    fn from(kind: CollectionKind) -> Self {
        kind.to_string()
    }
}

/// A record that a user keeps a resource in one of their collections.
/// The whole tuple is the identity; there is nothing else to update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub resource_id: ResourceId,
    pub resource_type: MediaKind,
    pub collection: CollectionKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_kind_parse() {
        assert_eq!(
            "watchlist".parse::<CollectionKind>().unwrap(),
            CollectionKind::Watchlist
        );
        assert_eq!(
            "list:weekend".parse::<CollectionKind>().unwrap(),
            CollectionKind::List(ListId::new("weekend"))
        );
        assert!("list:".parse::<CollectionKind>().is_err());
        assert!("favourites".parse::<CollectionKind>().is_err());
    }

    #[test]
    fn test_collection_kind_display_matches_parse() {
        let kind = CollectionKind::List(ListId::new("cl9x2"));
        assert_eq!(kind.to_string(), "list:cl9x2");
        assert_eq!(kind.to_string().parse::<CollectionKind>().unwrap(), kind);
    }

    #[test]
    fn test_membership_serde() {
        let membership = Membership {
            user_id: UserId::new("user-1"),
            resource_id: 550,
            resource_type: MediaKind::Movie,
            collection: CollectionKind::Watchlist,
        };

        let json = serde_json::to_value(&membership).unwrap();
        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["resource_type"], "movie");
        assert_eq!(json["collection"], "watchlist");

        let back: Membership = serde_json::from_value(json).unwrap();
        assert_eq!(back, membership);
    }
}
