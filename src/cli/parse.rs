//! Value parsers and argument normalization.

use std::ffi::OsString;

use crate::core::DateTime;

/// Canonicalize long flags: lowercase, `_` to `-`, plus a few aliases.
pub(super) fn normalize_args(mut raw: Vec<OsString>) -> Vec<OsString> {
    if raw.is_empty() {
        return raw;
    }

    let mut out = Vec::with_capacity(raw.len());
    out.push(raw.remove(0)); // program name

    let mut passthrough = false;
    for arg in raw {
        let s = arg.to_string_lossy().into_owned();
        if passthrough || !s.starts_with("--") || s == "--" {
            passthrough |= s == "--";
            out.push(arg);
            continue;
        }
        let (flag, val) = match s.split_once('=') {
            Some((flag, val)) => (flag, Some(val)),
            None => (s.as_str(), None),
        };
        let canon = flag.to_lowercase().replace('_', "-");
        let canon = canonical_flag(&canon);
        match val {
            Some(v) => out.push(OsString::from(format!("{canon}={v}"))),
            None => out.push(OsString::from(canon)),
        }
    }
    out
}

fn canonical_flag(flag: &str) -> &str {
    match flag {
        "--prio" => "--priority",
        "--desc" => "--description",
        "--assignee" => "--assign",
        "--hold" => "--on-hold",
        "--dep-type" => "--type",
        other => other,
    }
}

/// `YYYY-MM-DD`, optionally with ` HH:MM` or `THH:MM`.
pub(super) fn date_time(raw: &str) -> Result<DateTime, String> {
    DateTime::parse(raw).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(args: &[&str]) -> Vec<String> {
        normalize_args(args.iter().map(OsString::from).collect())
            .into_iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn flags_are_canonicalized() {
        assert_eq!(
            norm(&["clarity", "items", "create", "--On_Hold", "--prio=1", "Title_With_Case"]),
            ["clarity", "items", "create", "--on-hold", "--priority=1", "Title_With_Case"]
        );
    }

    #[test]
    fn values_after_double_dash_are_untouched() {
        assert_eq!(
            norm(&["clarity", "comments", "add", "item-1", "--", "--Not_A_Flag"]),
            ["clarity", "comments", "add", "item-1", "--", "--Not_A_Flag"]
        );
    }

    #[test]
    fn dates_accept_optional_times() {
        assert_eq!(date_time("2024-03-01 09:30").unwrap().time.as_deref(), Some("09:30"));
        assert!(date_time("tomorrow").is_err());
    }
}
