use crate::types::*;
use std::{
  env,
  fs,
  path::PathBuf,
  time::{SystemTime, UNIX_EPOCH},
};

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  if let Some(raw) = env_default("RACE_DAY_CONFIG_PATH") {
    return resolve_repo_path(&raw);
  }
  repo_root().join("race_day.json")
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
  env_default(key).and_then(|raw| raw.parse::<T>().ok())
}

/// Fill fields the config file left at their defaults from the environment.
pub fn apply_env_defaults(mut config: EngineConfig) -> EngineConfig {
  let defaults = EngineConfig::default();
  if config.bind_addr.trim().is_empty() || config.bind_addr == defaults.bind_addr {
    if let Some(value) = env_default("RACE_DAY_BIND_ADDR") {
      config.bind_addr = value;
    }
  }
  if config.tick_interval_ms == defaults.tick_interval_ms {
    if let Some(value) = env_parse::<u64>("RACE_DAY_TICK_MS") {
      config.tick_interval_ms = value;
    }
  }
  if config.seed.is_none() {
    config.seed = env_parse::<u64>("RACE_DAY_SEED");
  }
  if config.static_dir.trim().is_empty() {
    if let Some(value) = env_default("RACE_DAY_STATIC_DIR") {
      config.static_dir = value;
    }
  }
  if config.log_dir.trim().is_empty() || config.log_dir == defaults.log_dir {
    if let Some(value) = env_default("RACE_DAY_LOG_DIR") {
      config.log_dir = value;
    }
  }
  if config.tick_interval_ms == 0 {
    config.tick_interval_ms = DEFAULT_TICK_INTERVAL_MS;
  }
  config
}

pub fn load_config_inner() -> Result<EngineConfig, String> {
  let path = config_path();
  if !path.is_file() {
    return Ok(apply_env_defaults(EngineConfig::default()));
  }
  let data = fs::read_to_string(&path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config =
    serde_json::from_str::<EngineConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
  Ok(apply_env_defaults(config))
}

pub fn load_env_file() {
  let env_path = repo_root().join(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

pub fn now_ms() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64
}

pub fn log_dir_path(config: &EngineConfig) -> PathBuf {
  resolve_repo_path(config.log_dir.trim())
}

pub fn static_dir_path(config: &EngineConfig) -> Option<PathBuf> {
  let trimmed = config.static_dir.trim();
  if trimmed.is_empty() {
    return None;
  }
  Some(resolve_repo_path(trimmed)).filter(|path| path.is_dir())
}
