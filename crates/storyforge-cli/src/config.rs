use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use storyforge_core::{AiConfig, ModelType};
use tracing::{debug, warn};

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".storyforge")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load the config file, then fill empty credentials from the environment.
///
/// Without `--config`, a missing default file is not an error: the
/// environment alone configures the providers.
pub fn load(custom_path: &Option<PathBuf>) -> Result<AiConfig> {
    let env = |name: &str| std::env::var(name).ok();
    match custom_path {
        Some(path) => load_from(path, env),
        None => {
            let path = default_config_path();
            if path.exists() {
                load_from(&path, env)
            } else {
                debug!(
                    "No config at {}, using environment only",
                    path.display()
                );
                let mut config = AiConfig::default();
                config.apply_env(env);
                Ok(config)
            }
        }
    }
}

pub fn load_from(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<AiConfig> {
    check_permissions(path)?;

    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config at {}. Run `storyforge init` first.",
            path.display()
        )
    })?;

    // Judge hardcoded keys on the text as written, before expansion
    if let Ok(raw) = toml::from_str::<AiConfig>(&content) {
        warn_hardcoded_keys(&raw);
    }

    let expanded = expand_env_vars(&content, &lookup);
    let mut config: AiConfig = toml::from_str(&expanded)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;

    config.apply_env(lookup);
    Ok(config)
}

/// Refuse files that group or other can read; they may hold API keys
#[cfg(unix)]
fn check_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = std::fs::metadata(path) {
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(anyhow::anyhow!(
                "Config file {:?} has overly permissive permissions ({:o}). \
                 It may contain secrets. Fix with: chmod 600 {:?}",
                path,
                mode & 0o777,
                path
            ));
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn warn_hardcoded_keys(raw: &AiConfig) {
    for provider in ModelType::ALL {
        let key = &raw.providers.get(provider).api_key;
        if !key.trim().is_empty() && !key.contains("${") {
            warn!(
                "{} API key is hardcoded in config file. For security, use environment variables: api_key = \"${{{}}}\"",
                provider,
                provider.credential_env_var()
            );
        }
    }
}

/// Allowlist of environment variable names that may be expanded in config files.
/// This prevents an attacker who can modify the config from reading arbitrary env vars.
const ALLOWED_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_AI_API_KEY",
    "MISTRAL_API_KEY",
    "OLLAMA_BASE_URL",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            // Leave the ${VAR} unexpanded so it's obvious
            pos = abs_start + end + 1;
            continue;
        }

        let value = lookup(&var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600))
                .unwrap();
        }
        file
    }

    #[test]
    fn test_expand_allowlisted_vars() {
        let env = vars(&[("OPENAI_API_KEY", "sk-from-env")]);
        let expanded = expand_env_vars("api_key = \"${OPENAI_API_KEY}\"", |n| env.get(n).cloned());
        assert_eq!(expanded, "api_key = \"sk-from-env\"");
    }

    #[test]
    fn test_expand_skips_unlisted_vars() {
        let env = vars(&[("AWS_SECRET_ACCESS_KEY", "nope")]);
        let input = "a = \"${AWS_SECRET_ACCESS_KEY}\" b = \"${MISTRAL_API_KEY}\"";
        let expanded = expand_env_vars(input, |n| env.get(n).cloned());
        assert_eq!(expanded, "a = \"${AWS_SECRET_ACCESS_KEY}\" b = \"\"");
    }

    #[test]
    fn test_expand_unterminated() {
        let expanded = expand_env_vars("x = \"${OPENAI_API_KEY", |_| Some("v".to_string()));
        assert_eq!(expanded, "x = \"${OPENAI_API_KEY");
    }

    #[test]
    fn test_default_config_parses() {
        let env = vars(&[("ANTHROPIC_API_KEY", "sk-ant-test")]);
        let file = write_config(include_str!("../../../config/default.toml"));
        let config = load_from(file.path(), |n| env.get(n).cloned()).unwrap();
        assert_eq!(config.default_timeout_ms, 60_000);
        assert_eq!(config.providers.anthropic.api_key(), Some("sk-ant-test"));
        assert_eq!(config.providers.openai.api_key(), None);
        assert!(config.providers.ollama.base_url.is_none());
        assert_eq!(config.resolver.default_provider, ModelType::OpenAi);
    }

    #[test]
    fn test_load_from_file_with_overrides() {
        let file = write_config(
            r#"
default_timeout_ms = 15000
default_max_tokens = 800

[resolver]
default_provider = "anthropic"

[providers.ollama]
base_url = "http://gpu-box:11434"
"#,
        );
        let env = vars(&[("MISTRAL_API_KEY", "mistral-env")]);
        let config = load_from(file.path(), |n| env.get(n).cloned()).unwrap();
        assert_eq!(config.default_timeout_ms, 15_000);
        assert_eq!(config.default_max_tokens, Some(800));
        assert_eq!(config.resolver.default_provider, ModelType::Anthropic);
        assert_eq!(config.resolver.default_model, "gpt-4o");
        assert_eq!(
            config.providers.ollama.base_url.as_deref(),
            Some("http://gpu-box:11434")
        );
        assert_eq!(config.providers.mistral.api_key(), Some("mistral-env"));
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_permissive_file() {
        use std::os::unix::fs::PermissionsExt;
        let file = write_config("default_timeout_ms = 1000\n");
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        let err = load_from(file.path(), |_| None).unwrap_err();
        assert!(err.to_string().contains("chmod 600"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from(&dir.path().join("absent.toml"), |_| None).unwrap_err();
        assert!(err.to_string().contains("storyforge init"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let file = write_config("default_timeout_ms = \"soon\"\n");
        let err = load_from(file.path(), |_| None).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_config_dir_name() {
        assert!(config_dir().ends_with(".storyforge"));
    }
}
