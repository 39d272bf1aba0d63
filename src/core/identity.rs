//! Identity atoms.
//!
//! Every entity id has the shape `<prefix>-<n>`. Ids order naturally (prefix,
//! then numeric counter) so that map iteration follows creation order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{CoreError, InvalidId};

/// Every prefix the allocator hands out, including event ids.
pub const ID_PREFIXES: [&str; 9] = ["act", "proj", "out", "item", "dep", "cmt", "wlg", "att", "evt"];

/// Ids minted from the per-prefix counters in the aggregate.
pub trait AllocatedId: Sized {
    const PREFIX: &'static str;

    fn from_counter(n: u64) -> Self;
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn parse(raw: &str) -> Result<Self, CoreError> {
                validate_id($kind, raw).map(|s| Self(s.to_string()))
            }

            pub fn from_counter(n: u64) -> Self {
                Self(format!("{}-{}", $prefix, n))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Numeric suffix when the id was minted by the allocator.
            pub fn counter(&self) -> Option<u64> {
                counter_of(&self.0, $prefix)
            }
        }

        impl AllocatedId for $name {
            const PREFIX: &'static str = $prefix;

            fn from_counter(n: u64) -> Self {
                $name::from_counter(n)
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                natural_cmp(&self.0, &other.0)
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:?})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

entity_id!(
    /// Human or agent identity.
    ActorId, "act", "actor"
);
entity_id!(ProjectId, "proj", "project");
entity_id!(OutlineId, "out", "outline");
entity_id!(
    /// Work item within an outline.
    ItemId, "item", "item"
);
entity_id!(DepId, "dep", "dependency");
entity_id!(CommentId, "cmt", "comment");
entity_id!(WorklogId, "wlg", "worklog");
entity_id!(AttachmentId, "att", "attachment");
entity_id!(EventId, "evt", "event");

/// Opaque status identifier, unique within one outline.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusId(String);

impl StatusId {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        validate_id("status", raw).map(|s| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a status id from a human label: lowercase, alphanumerics kept,
    /// everything else collapsed to `-`.
    pub fn slug_from_label(label: &str) -> Self {
        let mut out = String::with_capacity(label.len());
        for ch in label.trim().chars() {
            if ch.is_alphanumeric() {
                out.extend(ch.to_lowercase());
            } else if !out.ends_with('-') && !out.is_empty() {
                out.push('-');
            }
        }
        let trimmed = out.trim_end_matches('-');
        if trimmed.is_empty() {
            Self("status".to_string())
        } else {
            Self(trimmed.to_string())
        }
    }
}

impl fmt::Debug for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusId({:?})", self.0)
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_id<'a>(kind: &'static str, raw: &'a str) -> Result<&'a str, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidId {
            kind,
            raw: raw.to_string(),
            reason: "empty".into(),
        }
        .into());
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(InvalidId {
            kind,
            raw: raw.to_string(),
            reason: "must not contain whitespace".into(),
        }
        .into());
    }
    Ok(trimmed)
}

fn split_counter(raw: &str) -> Option<(&str, u64)> {
    let (prefix, n) = raw.rsplit_once('-')?;
    if n.is_empty() || !n.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((prefix, n.parse().ok()?))
}

/// Counter of `raw` when it has the form `<prefix>-<n>`.
pub fn counter_of(raw: &str, prefix: &str) -> Option<u64> {
    split_counter(raw).and_then(|(p, n)| (p == prefix).then_some(n))
}

/// Prefix then numeric counter; raw bytes break remaining ties.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (split_counter(a), split_counter(b)) {
        (Some((pa, na)), Some((pb, nb))) => pa
            .cmp(pb)
            .then(na.cmp(&nb))
            .then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_sort_by_counter_not_bytes() {
        let mut ids = vec![
            ItemId::from_counter(10),
            ItemId::from_counter(2),
            ItemId::from_counter(1),
        ];
        ids.sort();
        let raw: Vec<&str> = ids.iter().map(ItemId::as_str).collect();
        assert_eq!(raw, vec!["item-1", "item-2", "item-10"]);
    }

    #[test]
    fn counter_requires_matching_prefix() {
        assert_eq!(counter_of("item-42", "item"), Some(42));
        assert_eq!(counter_of("item-42", "act"), None);
        assert_eq!(counter_of("item-x", "item"), None);
        assert_eq!(ItemId::parse("legacy").unwrap().counter(), None);
    }

    #[test]
    fn parse_rejects_blank_and_whitespace() {
        assert!(ActorId::parse("  ").is_err());
        assert!(ActorId::parse("act 1").is_err());
        assert_eq!(ActorId::parse(" act-1 ").unwrap().as_str(), "act-1");
    }

    #[test]
    fn status_slug_collapses_punctuation() {
        assert_eq!(StatusId::slug_from_label("In Review!").as_str(), "in-review");
        assert_eq!(StatusId::slug_from_label("???").as_str(), "status");
    }
}
