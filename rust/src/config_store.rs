use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::map::Map;
use toml::Value;

use crate::history_store::DEFAULT_HISTORY_LIMIT;
use crate::prompt_client::{
    ProviderSettings, DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
};
use crate::workspace::MIN_GENERATING;

const DEFAULT_SERVER_PORT: i64 = 3000;
const DEFAULT_MIN_GENERATING_MS: i64 = MIN_GENERATING.as_millis() as i64;

#[derive(Debug)]
pub struct ConfigStore {
    pub path: PathBuf,
    doc: Value,
}

impl ConfigStore {
    /// Loads the config file, creating it with defaults when missing. The
    /// normalized document is written back so every key is visible to the user.
    pub fn new(path: PathBuf) -> Result<Self> {
        let doc = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse TOML: {}", path.display()))?
        } else {
            log::info!("config not found, writing defaults to {}", path.display());
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create config dir: {}", parent.display())
                })?;
            }
            Value::Table(Map::new())
        };

        let mut store = Self { path, doc };
        store.normalize_doc();
        store.save()?;
        Ok(store)
    }

    pub fn save(&self) -> Result<()> {
        let serialized = toml::to_string_pretty(&self.doc).context("failed to serialize TOML")?;
        let text = move_app_table_to_top(&serialized);
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write config: {}", self.path.display()))
    }

    pub fn server_port(&self) -> u16 {
        self.app_table()
            .and_then(|t| t.get("server_port"))
            .and_then(value_to_i64)
            .and_then(|v| u16::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_SERVER_PORT as u16)
    }

    pub fn history_limit(&self) -> usize {
        self.app_table()
            .and_then(|t| t.get("history_limit"))
            .and_then(value_to_i64)
            .and_then(|v| usize::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    pub fn min_generating(&self) -> Duration {
        let millis = self
            .app_table()
            .and_then(|t| t.get("min_generating_ms"))
            .and_then(value_to_i64)
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(DEFAULT_MIN_GENERATING_MS as u64);
        Duration::from_millis(millis).max(MIN_GENERATING)
    }

    pub fn confirm_clear(&self) -> bool {
        self.app_table()
            .and_then(|t| t.get("confirm_clear"))
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Directory holding the history record. Relative paths and the empty
    /// default resolve against the config file's directory.
    pub fn data_dir(&self) -> PathBuf {
        let base = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let raw = self
            .app_table()
            .and_then(|t| t.get("data_dir"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if raw.is_empty() {
            return base;
        }
        let dir = PathBuf::from(raw);
        if dir.is_absolute() {
            dir
        } else {
            base.join(dir)
        }
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        let provider = self.provider_table();
        let text = |key: &str, fallback: &str| {
            provider
                .and_then(|t| t.get(key))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };

        ProviderSettings {
            endpoint: text("endpoint", DEFAULT_ENDPOINT),
            model: text("model", DEFAULT_MODEL),
            api_key_env: text("api_key_env", DEFAULT_API_KEY_ENV),
            max_tokens: provider
                .and_then(|t| t.get("max_tokens"))
                .and_then(value_to_i64)
                .and_then(|v| u32::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    fn normalize_doc(&mut self) {
        if !self.doc.is_table() {
            self.doc = Value::Table(Map::new());
        }

        {
            let app = ensure_table_mut(self.root_table_mut(), "app");

            let port = app
                .get("server_port")
                .and_then(value_to_i64)
                .filter(|v| (1..=65_535).contains(v))
                .unwrap_or(DEFAULT_SERVER_PORT);
            app.insert("server_port".to_string(), Value::Integer(port));

            let limit = app
                .get("history_limit")
                .and_then(value_to_i64)
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_HISTORY_LIMIT as i64);
            app.insert("history_limit".to_string(), Value::Integer(limit));

            let min_generating = app
                .get("min_generating_ms")
                .and_then(value_to_i64)
                .map(|v| v.max(DEFAULT_MIN_GENERATING_MS))
                .unwrap_or(DEFAULT_MIN_GENERATING_MS);
            app.insert(
                "min_generating_ms".to_string(),
                Value::Integer(min_generating),
            );

            if app.get("confirm_clear").and_then(Value::as_bool).is_none() {
                app.insert("confirm_clear".to_string(), Value::Boolean(true));
            }

            if app.get("data_dir").and_then(Value::as_str).is_none() {
                app.insert("data_dir".to_string(), Value::String(String::new()));
            }
        }

        {
            let provider = ensure_table_mut(self.root_table_mut(), "provider");

            for (key, fallback) in [
                ("endpoint", DEFAULT_ENDPOINT),
                ("model", DEFAULT_MODEL),
                ("api_key_env", DEFAULT_API_KEY_ENV),
            ] {
                let value = provider
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(fallback)
                    .to_string();
                provider.insert(key.to_string(), Value::String(value));
            }

            let max_tokens = provider
                .get("max_tokens")
                .and_then(value_to_i64)
                .filter(|v| *v > 0)
                .unwrap_or(i64::from(DEFAULT_MAX_TOKENS));
            provider.insert("max_tokens".to_string(), Value::Integer(max_tokens));
        }
    }

    fn app_table(&self) -> Option<&Map<String, Value>> {
        self.doc
            .as_table()
            .and_then(|root| root.get("app"))
            .and_then(Value::as_table)
    }

    fn provider_table(&self) -> Option<&Map<String, Value>> {
        self.doc
            .as_table()
            .and_then(|root| root.get("provider"))
            .and_then(Value::as_table)
    }

    fn root_table_mut(&mut self) -> &mut Map<String, Value> {
        if !self.doc.is_table() {
            self.doc = Value::Table(Map::new());
        }
        match &mut self.doc {
            Value::Table(root) => root,
            _ => unreachable!("root was just replaced with a table"),
        }
    }
}

fn ensure_table_mut<'a>(root: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let entry = root
        .entry(key.to_string())
        .or_insert_with(|| Value::Table(Map::new()));
    if !entry.is_table() {
        *entry = Value::Table(Map::new());
    }
    match entry {
        Value::Table(table) => table,
        _ => unreachable!("entry was just replaced with a table"),
    }
}

fn value_to_i64(value: &Value) -> Option<i64> {
    value
        .as_integer()
        .or_else(|| value.as_float().map(|v| v as i64))
        .or_else(|| value.as_str().and_then(|v| v.trim().parse::<i64>().ok()))
}

fn move_app_table_to_top(serialized: &str) -> String {
    let ends_with_newline = serialized.ends_with('\n');
    let lines: Vec<&str> = serialized.split('\n').collect();
    let header_starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| is_top_level_header_line(line).then_some(index))
        .collect();

    let Some(&first_header) = header_starts.first() else {
        return serialized.to_string();
    };

    let app_block = header_starts.iter().enumerate().find_map(|(i, start)| {
        (lines[*start].trim() == "[app]").then(|| {
            let end = header_starts.get(i + 1).copied().unwrap_or(lines.len());
            (*start, end)
        })
    });

    let Some((app_start, app_end)) = app_block else {
        return serialized.to_string();
    };
    if app_start == first_header {
        return serialized.to_string();
    }

    let mut rebuilt: Vec<&str> = Vec::with_capacity(lines.len());
    rebuilt.extend_from_slice(&lines[..first_header]);
    rebuilt.extend_from_slice(&lines[app_start..app_end]);
    for (i, start) in header_starts.iter().enumerate() {
        if *start == app_start {
            continue;
        }
        let end = header_starts.get(i + 1).copied().unwrap_or(lines.len());
        rebuilt.extend_from_slice(&lines[*start..end]);
    }

    let mut output = rebuilt.join("\n");
    if ends_with_newline && !output.ends_with('\n') {
        output.push('\n');
    }
    output
}

fn is_top_level_header_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        return false;
    }
    !trimmed.contains(" = ")
}
