use super::UsageDataLoader;
use crate::models::*;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Loads usage events from the JSONL transcripts Claude Code writes
pub struct JsonlUsageLoader {
    data_paths: Vec<PathBuf>,
}

impl JsonlUsageLoader {
    /// Discover data directories from config, environment and standard locations
    pub fn new(extra_paths: &[PathBuf]) -> Result<Self> {
        let data_paths = Self::discover_claude_paths(extra_paths)?;

        if data_paths.is_empty() {
            log::warn!("No Claude data directories found. Usage history will be empty.");
        } else {
            log::info!("Found Claude data paths: {:?}", data_paths);
        }

        Ok(Self { data_paths })
    }

    /// Loader over an explicit set of directories, without discovery
    pub fn with_paths(data_paths: Vec<PathBuf>) -> Self {
        Self { data_paths }
    }

    pub fn data_paths(&self) -> &[PathBuf] {
        &self.data_paths
    }

    pub fn discover_claude_paths(extra_paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;

        let mut paths: Vec<PathBuf> = extra_paths.to_vec();

        if let Ok(env_paths) = std::env::var("CLAUDE_DATA_PATHS") {
            paths.extend(
                env_paths
                    .split(':')
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from),
            );
        }

        if let Ok(env_path) = std::env::var("CLAUDE_DATA_PATH") {
            paths.push(PathBuf::from(env_path));
        }

        paths.push(home_dir.join(".claude").join("projects"));
        paths.push(home_dir.join(".config").join("claude").join("projects"));

        let mut seen = HashSet::new();
        Ok(paths
            .into_iter()
            .filter(|path| path.is_dir())
            .filter(|path| seen.insert(path.clone()))
            .collect())
    }

    fn jsonl_files(&self) -> Vec<PathBuf> {
        self.data_paths
            .iter()
            .flat_map(|data_path| {
                log::debug!("Scanning directory: {:?}", data_path);
                WalkDir::new(data_path)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| e.path().extension().map_or(false, |ext| ext == "jsonl"))
                    .map(|e| e.into_path())
            })
            .collect()
    }

    async fn scan_usage_files(&self) -> Result<Vec<UsageEvent>> {
        let mut all_events = Vec::new();

        for file_path in self.jsonl_files() {
            match parse_jsonl_file(&file_path).await {
                Ok(mut events) => all_events.append(&mut events),
                Err(e) => log::warn!("Failed to read JSONL file {:?}: {}", file_path, e),
            }
        }

        // Stable sort keeps file order for equal timestamps, so the first
        // occurrence of a duplicate is the one retained
        all_events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        let events = deduplicate(all_events);

        log::debug!("Loaded {} usage events from JSONL files", events.len());
        Ok(events)
    }
}

impl UsageDataLoader for JsonlUsageLoader {
    async fn load_usage_data(&self) -> Result<Vec<UsageEvent>> {
        self.scan_usage_files().await
    }
}

/// Drop repeats of a `(message_id, request_id)` pair; events missing either id are kept
pub fn deduplicate(events: Vec<UsageEvent>) -> Vec<UsageEvent> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    events
        .into_iter()
        .filter(|event| match event.dedup_key() {
            Some((message, request)) => seen.insert((message.to_string(), request.to_string())),
            None => true,
        })
        .collect()
}

async fn parse_jsonl_file(file_path: &Path) -> Result<Vec<UsageEvent>> {
    let content = fs::read_to_string(file_path).await?;
    let mut events = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(json) => match parse_usage_event(&json) {
                Some(event) => events.push(event),
                None => log::trace!("No usage on line {} in {:?}", line_num + 1, file_path),
            },
            Err(e) => {
                log::debug!("Skipping invalid JSON line {} in {:?}: {}", line_num + 1, file_path, e);
            }
        }
    }

    Ok(events)
}

/// Parse one transcript line. Accepts the nested Claude Code shape
/// (`message.usage`, `message.model`, `message.id`, `requestId`) and a flat
/// shape (`usage`, `model`, `message_id`, `request_id`).
pub fn parse_usage_event(json: &Value) -> Option<UsageEvent> {
    let timestamp = json
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))?;

    let message = json.get("message");
    let usage = message
        .and_then(|m| m.get("usage"))
        .or_else(|| json.get("usage"))
        .filter(|u| u.is_object())?;

    let tokens = |field: &str| usage.get(field).and_then(Value::as_u64).unwrap_or(0);
    let text = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);

    let model = text(message.and_then(|m| m.get("model"))).or_else(|| text(json.get("model")));
    let message_id = text(message.and_then(|m| m.get("id")))
        .or_else(|| text(json.get("message_id")))
        .or_else(|| text(json.get("messageId")));
    let request_id = text(json.get("requestId")).or_else(|| text(json.get("request_id")));

    Some(
        UsageEvent::new(timestamp, ModelId::from_option(model))
            .with_tokens(tokens("input_tokens"), tokens("output_tokens"))
            .with_cache(
                tokens("cache_creation_input_tokens"),
                tokens("cache_read_input_tokens"),
            )
            .with_ids(message_id, request_id),
    )
}
