//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level command and drives grok-core
//! through `Settings` / `Engine`.

pub mod profiles;
pub mod providers;
pub mod run;

use std::path::{Path, PathBuf};

use grok_core::Settings;

/// Read settings from the environment, applying a `--profiles-dir` flag.
pub fn load_settings(profiles_dir: Option<&Path>) -> Result<Settings, String> {
    let mut settings = Settings::from_env().map_err(|e| e.to_string())?;
    if let Some(dir) = profiles_dir {
        settings.profiles_dir = dir.to_path_buf();
    }
    Ok(settings)
}

/// Pretty-print a serializable value to stdout.
pub fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// Load `.env.local` then `.env` from `dir` into the process environment.
///
/// Variables already set keep their value. Returns the files that were read.
pub fn load_dotenv(dir: &Path) -> Vec<PathBuf> {
    let mut loaded = Vec::new();
    for filename in [".env.local", ".env"] {
        let path = dir.join(filename);
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        for (key, value) in content.lines().filter_map(parse_env_line) {
            if std::env::var_os(&key).is_none() {
                std::env::set_var(&key, &value);
            }
        }
        tracing::info!("[Env] Loaded environment from '{}'", path.display());
        loaded.push(path);
    }
    loaded
}

/// Parse one `KEY=VALUE` line; comments, blanks and malformed lines yield `None`.
pub fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value);
    Some((key.to_string(), unquoted.to_string()))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_line() {
        assert_eq!(
            parse_env_line("GROK_OLLAMA_URL=http://gpu:11434"),
            Some(("GROK_OLLAMA_URL".to_string(), "http://gpu:11434".to_string()))
        );
        assert_eq!(
            parse_env_line("export KEY = \"quoted value\" "),
            Some(("KEY".to_string(), "quoted value".to_string()))
        );
        assert_eq!(parse_env_line("EMPTY="), Some(("EMPTY".to_string(), String::new())));
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line("   "), None);
        assert_eq!(parse_env_line("no equals sign"), None);
        assert_eq!(parse_env_line("=value"), None);
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Business Meeting Analysis", 10), "Business …");
        assert_eq!(truncate("ééééé", 3), "éé…");
    }
}
