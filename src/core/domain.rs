//! Domain enums and scalar types.
//!
//! ActorKind: human or agent
//! DepType: blocks or related
//! Priority: 0-4 (0 = most urgent)
//! DateTime: calendar date with optional wall-clock time

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, Time};

use super::error::{CoreError, InvalidValue, RangeError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Human,
    Agent,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
        }
    }
}

impl FromStr for ActorKind {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "human" | "user" => Ok(Self::Human),
            "agent" | "bot" => Ok(Self::Agent),
            _ => Err(InvalidValue::new("actor kind", raw, "expected human or agent").into()),
        }
    }
}

/// Dependency relationship kind. Only `Blocks` participates in gating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepType {
    Blocks,
    Related,
}

impl DepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::Related => "related",
        }
    }
}

impl FromStr for DepType {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "blocks" | "block" | "blocker" => Ok(Self::Blocks),
            "related" | "relates" | "relates-to" => Ok(Self::Related),
            _ => Err(InvalidValue::new("dependency type", raw, "expected blocks or related").into()),
        }
    }
}

impl fmt::Display for DepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an attachment hangs off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Item,
    Comment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Comment => "comment",
        }
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "item" => Ok(Self::Item),
            "comment" => Ok(Self::Comment),
            _ => Err(InvalidValue::new("entity kind", raw, "expected item or comment").into()),
        }
    }
}

/// Priority level: 0-4 inclusive, 0 = most urgent.
///
/// Validated at construction - invalid values are unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Priority(u8);

impl Priority {
    pub const URGENT: Priority = Priority(0);
    pub const HIGH: Priority = Priority(1);
    pub const MEDIUM: Priority = Priority(2);
    pub const LOW: Priority = Priority(3);
    pub const LOWEST: Priority = Priority(4);

    pub fn new(n: i64) -> Result<Self, CoreError> {
        if !(0..=4).contains(&n) {
            return Err(RangeError {
                field: "priority",
                value: n,
                min: 0,
                max: 4,
            }
            .into());
        }
        Ok(Self(n as u8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl TryFrom<i64> for Priority {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for i64 {
    fn from(value: Priority) -> Self {
        i64::from(value.0)
    }
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim().to_ascii_lowercase();
        if let Ok(n) = s.trim_start_matches('p').parse::<i64>() {
            return Self::new(n);
        }
        match s.as_str() {
            "urgent" | "critical" => Ok(Self::URGENT),
            "high" => Ok(Self::HIGH),
            "medium" | "med" | "normal" => Ok(Self::MEDIUM),
            "low" => Ok(Self::LOW),
            "lowest" | "backlog" => Ok(Self::LOWEST),
            _ => Err(InvalidValue::new("priority", raw, "expected 0-4 or a level name").into()),
        }
    }
}

/// Calendar date with an optional `HH:MM` time, used for due and schedule.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateTime {
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl DateTime {
    /// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM` and `YYYY-MM-DDTHH:MM`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        let (date_part, time_part) = match trimmed.split_once(['T', ' ']) {
            Some((d, t)) => (d, Some(t.trim())),
            None => (trimmed, None),
        };
        let date = Date::parse(date_part, format_description!("[year]-[month]-[day]"))
            .map_err(|e| InvalidValue::new("date", raw, e.to_string()))?;
        let time = match time_part {
            Some(t) if !t.is_empty() => {
                let parsed = Time::parse(t, format_description!("[hour]:[minute]"))
                    .map_err(|e| InvalidValue::new("time", raw, e.to_string()))?;
                Some(format!("{:02}:{:02}", parsed.hour(), parsed.minute()))
            }
            _ => None,
        };
        Ok(Self {
            date: format!(
                "{:04}-{:02}-{:02}",
                date.year(),
                u8::from(date.month()),
                date.day()
            ),
            time,
        })
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.time {
            Some(t) => write!(f, "{} {}", self.date, t),
            None => f.write_str(&self.date),
        }
    }
}

/// Trim a tag and drop a leading `#`; empty or whitespace-bearing tags are refused.
pub fn normalize_tag(raw: &str) -> Result<String, CoreError> {
    let tag = raw.trim().trim_start_matches('#');
    if tag.is_empty() {
        return Err(InvalidValue::new("tag", raw, "empty").into());
    }
    if tag.chars().any(char::is_whitespace) {
        return Err(InvalidValue::new("tag", raw, "must not contain whitespace").into());
    }
    Ok(tag.to_string())
}
