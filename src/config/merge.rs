use super::{Config, ConfigLayer, OutputFormat};

pub fn merge_layers(user: Option<ConfigLayer>, workspace: Option<ConfigLayer>) -> Config {
    let mut config = Config::default();
    if let Some(layer) = user {
        layer.apply_to(&mut config);
    }
    if let Some(layer) = workspace {
        layer.apply_to(&mut config);
    }
    config
}

/// Returns a warning per ignored variable.
pub fn apply_env_overrides(config: &mut Config) -> Vec<String> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

/// Environment layer over an arbitrary lookup. Unparseable values are
/// ignored and reported back for the caller to log.
pub fn apply_overrides_from(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    let var = |key: &str| {
        lookup(key)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
    };

    if let Some(raw) = var("CLARITY_ASSIGN_GRACE_SECONDS") {
        match raw.parse::<u64>() {
            Ok(secs) => config.assign_grace_seconds = secs,
            Err(err) => {
                warnings.push(format!("invalid CLARITY_ASSIGN_GRACE_SECONDS, ignoring: {err}"))
            }
        }
    }

    if let Some(raw) = var("CLARITY_AUTOSYNC") {
        match parse_flag(&raw) {
            Some(auto) => config.sync.auto = auto,
            None => warnings.push(format!("invalid CLARITY_AUTOSYNC `{raw}`, ignoring")),
        }
    }

    if let Some(raw) = var("CLARITY_FORMAT") {
        match raw.parse::<OutputFormat>() {
            Ok(format) => config.output.format = format,
            Err(err) => warnings.push(format!("invalid CLARITY_FORMAT, ignoring: {err}")),
        }
    }
    warnings
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::{OutputConfigOverride, SyncConfigOverride};

    #[test]
    fn workspace_layer_wins_over_user_layer() {
        let user = ConfigLayer {
            assign_grace_seconds: Some(60),
            sync: SyncConfigOverride {
                auto: Some(true),
                timeout_secs: None,
            },
            ..ConfigLayer::default()
        };
        let workspace = ConfigLayer {
            assign_grace_seconds: Some(120),
            output: OutputConfigOverride {
                format: Some(OutputFormat::Edn),
                pretty: None,
            },
            ..ConfigLayer::default()
        };

        let config = merge_layers(Some(user), Some(workspace));
        assert_eq!(config.assign_grace_seconds, 120);
        assert!(config.sync.auto);
        assert_eq!(config.sync.timeout_secs, 20);
        assert_eq!(config.output.format, OutputFormat::Edn);
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        let env: BTreeMap<&str, &str> = [
            ("CLARITY_ASSIGN_GRACE_SECONDS", "90"),
            ("CLARITY_AUTOSYNC", "yes"),
            ("CLARITY_FORMAT", "yaml"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        let warnings = apply_overrides_from(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.assign_grace_seconds, 90);
        assert!(config.sync.auto);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("CLARITY_FORMAT"));
    }
}
