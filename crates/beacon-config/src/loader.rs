use crate::error::ConfigError;
use crate::schema::BeaconConfig;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Jsonc,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext {
            "jsonc" => Some(Self::Jsonc),
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Jsonc => "JSONC",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: BeaconConfig,
    pub path: PathBuf,
    pub format: ConfigFormat,
}

pub fn load_config(config_path: Option<&Path>) -> Result<BeaconConfig> {
    resolve_config(config_path).map(|r| r.config)
}

pub fn resolve_config(config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .or_else(find_config_file)
        .ok_or(ConfigError::NotFound)?;

    load_config_from_file(&path)
}

pub fn load_config_from_file(path: &Path) -> Result<ResolvedConfig> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| ConfigError::UnknownFormat(path.to_path_buf()))?;

    let config = parse_config_content(&content, format)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(ResolvedConfig {
        config: expand_env_vars(config),
        path: path.to_path_buf(),
        format,
    })
}

fn parse_config_content(content: &str, format: ConfigFormat) -> Result<BeaconConfig, ConfigError> {
    let parsed = match format {
        ConfigFormat::Jsonc => json5::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Yaml => serde_yaml_ng::from_str(content).map_err(|e| e.to_string()),
    };

    parsed.map_err(|message| ConfigError::Parse {
        format: format.name(),
        message,
    })
}

const CONFIG_CANDIDATES: &[&str] = &[
    "beacon.jsonc",
    "beacon.json",
    "beacon.yml",
    "beacon.yaml",
    ".beacon.jsonc",
    ".beacon.json",
    ".beacon.yml",
    ".beacon.yaml",
];

fn global_config_dir() -> Option<PathBuf> {
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join("beacon"))
}

fn candidate_paths() -> impl Iterator<Item = PathBuf> {
    let local = CONFIG_CANDIDATES.iter().map(PathBuf::from);
    let global = global_config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_CANDIDATES.iter().map(move |c| dir.join(c)));
    local.chain(global)
}

fn find_config_file() -> Option<PathBuf> {
    candidate_paths().find(|path| path.exists())
}

pub fn find_all_config_files() -> Vec<PathBuf> {
    candidate_paths().filter(|path| path.exists()).collect()
}

fn expand_env_vars(mut config: BeaconConfig) -> BeaconConfig {
    config.telemetry.level = expand_env_string(&config.telemetry.level);
    config
}

fn expand_env_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        if chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            // An unterminated reference is kept verbatim.
            match env::var(&var_name) {
                Ok(value) if closed => result.push_str(&value),
                _ => {
                    result.push_str("${");
                    result.push_str(&var_name);
                    if closed {
                        result.push('}');
                    }
                }
            }
            continue;
        }

        // Stop at the delimiter without consuming it.
        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                var_name.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if var_name.is_empty() {
            result.push('$');
        } else if let Ok(value) = env::var(&var_name) {
            result.push_str(&value);
        } else {
            result.push('$');
            result.push_str(&var_name);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LegacyLoadingPolicy;
    use tempfile::TempDir;

    #[test]
    fn test_expand_env_string_with_braces() {
        env::set_var("BEACON_TEST_VAR", "test_value");
        let result = expand_env_string("prefix_${BEACON_TEST_VAR}_suffix");
        assert_eq!(result, "prefix_test_value_suffix");
    }

    #[test]
    fn test_expand_env_string_without_braces() {
        env::set_var("BEACON_TEST_VAR", "test_value");
        let result = expand_env_string("prefix_$BEACON_TEST_VAR");
        assert_eq!(result, "prefix_test_value");
    }

    #[test]
    fn test_expand_env_string_preserves_space_after_var() {
        env::set_var("BEACON_TEST_VAR2", "value");
        let result = expand_env_string("hello $BEACON_TEST_VAR2 world");
        assert_eq!(result, "hello value world");
    }

    #[test]
    fn test_expand_env_string_missing_var() {
        let result = expand_env_string("prefix_${BEACON_NONEXISTENT_VAR}_suffix");
        assert_eq!(result, "prefix_${BEACON_NONEXISTENT_VAR}_suffix");
        assert_eq!(expand_env_string("cost: $"), "cost: $");
    }

    #[test]
    fn test_expand_env_string_unterminated_brace() {
        env::set_var("BEACON_TEST_UNTERMINATED", "value");
        assert_eq!(
            expand_env_string("prefix_${BEACON_TEST_UNTERMINATED"),
            "prefix_${BEACON_TEST_UNTERMINATED"
        );
        assert_eq!(expand_env_string("${"), "${");
        assert_eq!(expand_env_string("a ${BEACON_MISSING_VAR"), "a ${BEACON_MISSING_VAR");
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("beacon.jsonc")),
            Some(ConfigFormat::Jsonc)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("beacon.json")),
            Some(ConfigFormat::Json)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("beacon.yml")),
            Some(ConfigFormat::Yaml)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("beacon.yaml")),
            Some(ConfigFormat::Yaml)
        );
        assert_eq!(ConfigFormat::from_path(Path::new("beacon.toml")), None);
    }

    #[test]
    fn test_config_priority_order() {
        assert_eq!(CONFIG_CANDIDATES[0], "beacon.jsonc");
        assert_eq!(CONFIG_CANDIDATES[1], "beacon.json");
        assert_eq!(CONFIG_CANDIDATES[2], "beacon.yml");
        assert_eq!(CONFIG_CANDIDATES[3], "beacon.yaml");
        assert_eq!(CONFIG_CANDIDATES[4], ".beacon.jsonc");
        assert_eq!(CONFIG_CANDIDATES[7], ".beacon.yaml");
    }

    #[test]
    fn test_resolve_config_from_jsonc_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beacon.jsonc");

        let content = r#"{
  // Focused session only
  "bridge": { "legacy_policy": "ignore" },
  "view": { "tick_interval_ms": 250 } /* faster clock */
}"#;
        fs::write(&path, content).unwrap();

        let resolved = load_config_from_file(&path).unwrap();
        assert_eq!(resolved.format, ConfigFormat::Jsonc);
        assert_eq!(resolved.config.bridge.legacy_policy, LegacyLoadingPolicy::Ignore);
        assert_eq!(resolved.config.view.tick_interval_ms, 250);
        assert_eq!(resolved.config.cancel.rpc_timeout_secs, 5);
    }

    #[test]
    fn test_resolve_config_from_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beacon.json");
        fs::write(&path, r#"{"cancel": {"rpc_timeout_secs": 10}}"#).unwrap();

        let resolved = load_config_from_file(&path).unwrap();
        assert_eq!(resolved.format, ConfigFormat::Json);
        assert_eq!(resolved.config.cancel.rpc_timeout_secs, 10);
        assert_eq!(resolved.path, path);
    }

    #[test]
    fn test_resolve_config_from_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beacon.yml");

        let content = r#"
telemetry:
  level: debug
  json_output: true
bridge:
  channel_capacity: 64
"#;
        fs::write(&path, content).unwrap();

        let resolved = load_config_from_file(&path).unwrap();
        assert_eq!(resolved.format, ConfigFormat::Yaml);
        assert_eq!(resolved.config.telemetry.level, "debug");
        assert!(resolved.config.telemetry.json_output);
        assert_eq!(resolved.config.bridge.channel_capacity, 64);
    }

    #[test]
    fn test_env_vars_expanded_after_load() {
        env::set_var("BEACON_TEST_LEVEL", "beacon_events=trace");
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beacon.json");
        fs::write(&path, r#"{"telemetry": {"level": "${BEACON_TEST_LEVEL}"}}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.telemetry.level, "beacon_events=trace");
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beacon.toml");
        fs::write(&path, "[bridge]").unwrap();

        let err = load_config_from_file(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_missing_file_reports_read_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");

        let err = load_config_from_file(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_invalid_content_reports_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beacon.json");
        fs::write(&path, r#"{"view": {"tick_interval_ms": "soon"}}"#).unwrap();

        let err = load_config_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Parse { format: "JSON", .. })
        ));
    }
}
