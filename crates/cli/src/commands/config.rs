use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hoops_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: EXIT_CONFIG,
                output: format!("config validation failed: {error}"),
            }
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(&config) {
        let source = field_source(
            entry.key,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    let optional = |value: Option<String>| value.unwrap_or_else(|| "<unset>".to_string());

    vec![
        Entry {
            key: "llm.provider",
            value: format!("{:?}", config.llm.provider),
            env_keys: &["HOOPS_LLM_PROVIDER"],
        },
        Entry {
            key: "llm.api_key",
            value: config.llm.api_key.as_ref().map_or_else(|| "<unset>".to_string(), redact_key),
            env_keys: &["HOOPS_LLM_API_KEY", "GEMINI_API_KEY"],
        },
        Entry {
            key: "llm.base_url",
            value: config.llm.base_url.clone(),
            env_keys: &["HOOPS_LLM_BASE_URL"],
        },
        Entry { key: "llm.model", value: config.llm.model.clone(), env_keys: &["HOOPS_LLM_MODEL"] },
        Entry {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["HOOPS_LLM_TIMEOUT_SECS"],
        },
        Entry {
            key: "llm.max_tool_turns",
            value: config.llm.max_tool_turns.to_string(),
            env_keys: &["HOOPS_LLM_MAX_TOOL_TURNS"],
        },
        Entry {
            key: "llm.temperature",
            value: optional(config.llm.temperature.map(|value| value.to_string())),
            env_keys: &["HOOPS_LLM_TEMPERATURE"],
        },
        Entry {
            key: "llm.fixture_path",
            value: optional(config.llm.fixture_path.as_ref().map(|path| path.display().to_string())),
            env_keys: &["HOOPS_LLM_FIXTURE_PATH"],
        },
        Entry {
            key: "analysis.variant",
            value: config.analysis.variant.to_string(),
            env_keys: &["HOOPS_ANALYSIS_VARIANT"],
        },
        Entry {
            key: "analysis.max_upload_bytes",
            value: config.analysis.max_upload_bytes.to_string(),
            env_keys: &["HOOPS_ANALYSIS_MAX_UPLOAD_BYTES"],
        },
        Entry {
            key: "analysis.max_concurrent",
            value: config.analysis.max_concurrent.to_string(),
            env_keys: &["HOOPS_ANALYSIS_MAX_CONCURRENT"],
        },
        Entry {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["HOOPS_SERVER_BIND_ADDRESS"],
        },
        Entry {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["HOOPS_SERVER_PORT"],
        },
        Entry {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["HOOPS_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Entry {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["HOOPS_LOGGING_LEVEL", "HOOPS_LOG_LEVEL"],
        },
        Entry {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["HOOPS_LOGGING_FORMAT", "HOOPS_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("hoops.toml"), PathBuf::from("config/hoops.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short prefix so operators can tell keys apart.
fn redact_key(key: &SecretString) -> String {
    let trimmed = key.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.len() <= 8 {
        return "<redacted>".to_string();
    }
    let prefix: String = trimmed.chars().take(4).collect();
    format!("{prefix}***")
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use toml::Value;

    use super::{contains_path, redact_key};

    #[test]
    fn keys_are_never_printed_in_full() {
        let key = SecretString::from("AIzaSyExampleKey1234".to_string());
        assert_eq!(redact_key(&key), "AIza***");
        assert_eq!(redact_key(&SecretString::from("short".to_string())), "<redacted>");
        assert_eq!(redact_key(&SecretString::from("  ".to_string())), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_the_file() {
        let doc: Value = "[llm]\nmodel = \"gemini-2.0-flash\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
