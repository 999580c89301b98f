//! Herd Config - 통합 설정
//!
//! Request coordinator defaults and stream request defaults, loaded from the
//! global config directory and overlaid by the project directory.

use super::layer::{merge_json, ConfigLayer};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// 설정 파일명
pub const HERD_CONFIG_FILE: &str = "config.json";

// ============================================================================
// Herd Config (통합)
// ============================================================================

/// herd 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HerdConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Request coordinator defaults
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Stream request defaults
    #[serde(default)]
    pub stream: StreamConfig,
}

impl Default for HerdConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            coordinator: CoordinatorConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl HerdConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let mut layers = Vec::new();

        // 1. 글로벌 설정
        if let Ok(global) = ConfigLayer::global(HERD_CONFIG_FILE) {
            layers.extend(global.read()?);
        }

        // 2. 프로젝트 설정
        if let Ok(project) = ConfigLayer::current_project(HERD_CONFIG_FILE) {
            layers.extend(project.read()?);
        }

        Self::from_layers(layers)
    }

    /// 특정 파일에서 로드 (--config)
    pub fn load_from(path: &Path) -> Result<Self> {
        let layer = ConfigLayer::at(path);
        let value = layer.read()?.ok_or_else(|| {
            crate::Error::Config(format!("Config file not found: {}", path.display()))
        })?;
        Self::from_layers([value])
    }

    /// Overlay raw JSON layers in order; a field set in a later layer wins
    /// even when it equals the built-in default.
    pub fn from_layers(layers: impl IntoIterator<Item = Value>) -> Result<Self> {
        let mut merged = Value::Object(Default::default());
        for layer in layers {
            merge_json(&mut merged, layer);
        }
        Ok(serde_json::from_value(merged)?)
    }

    /// 글로벌 설정 저장
    pub fn save_global(&self) -> Result<()> {
        ConfigLayer::global(HERD_CONFIG_FILE)?.write(self)
    }

    /// 프로젝트 설정 저장
    pub fn save_project(&self) -> Result<()> {
        ConfigLayer::current_project(HERD_CONFIG_FILE)?.write(self)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.coordinator.ttl_ms = ttl_ms;
        self
    }

    pub fn throttle_ms(mut self, throttle_ms: u64) -> Self {
        self.coordinator.throttle_ms = throttle_ms;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.stream.default_headers.insert(name.into(), value.into());
        self
    }
}

// ============================================================================
// Coordinator Config
// ============================================================================

/// Cache lifetime and dispatch spacing applied when a caller does not pass
/// explicit options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorConfig {
    /// 캐시 유지 시간 (ms)
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// 같은 키에 대한 최소 디스패치 간격 (ms)
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            throttle_ms: default_throttle_ms(),
        }
    }
}

impl CoordinatorConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

// ============================================================================
// Stream Config
// ============================================================================

/// 스트리밍 요청 기본값
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    /// Accept 헤더
    #[serde(default = "default_accept")]
    pub accept: String,

    /// User-Agent 헤더
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// 모든 스트림 요청에 붙는 헤더 (요청별 헤더가 우선)
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            accept: default_accept(),
            user_agent: None,
            default_headers: BTreeMap::new(),
        }
    }
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_ttl_ms() -> u64 {
    30_000
}
fn default_throttle_ms() -> u64 {
    1_500
}
fn default_accept() -> String {
    "text/event-stream".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_herd_config_default() {
        let config = HerdConfig::new();
        assert_eq!(config.version, 1);
        assert_eq!(config.coordinator.ttl(), Duration::from_secs(30));
        assert_eq!(config.coordinator.throttle(), Duration::from_millis(1500));
        assert_eq!(config.stream.accept, "text/event-stream");
        assert!(config.stream.default_headers.is_empty());
    }

    #[test]
    fn test_layers_merge_by_presence() {
        let global = json!({
            "coordinator": {"ttlMs": 10_000},
            "stream": {"defaultHeaders": {"X-Farm": "north"}}
        });
        let project = json!({
            "coordinator": {"ttlMs": 30_000, "throttleMs": 500},
            "stream": {"defaultHeaders": {"X-Api-Key": "k"}}
        });

        let config = HerdConfig::from_layers([global, project]).unwrap();

        // Explicitly set back to the default value: the project still wins
        assert_eq!(config.coordinator.ttl_ms, 30_000);
        assert_eq!(config.coordinator.throttle_ms, 500);
        assert_eq!(config.stream.default_headers.len(), 2);
    }

    #[test]
    fn test_layers_keep_unset_fields() {
        let global = json!({"coordinator": {"throttleMs": 250}, "stream": {"userAgent": "herd"}});
        let project = json!({"coordinator": {"ttlMs": 1_000}});

        let config = HerdConfig::from_layers([global, project]).unwrap();
        assert_eq!(config.coordinator.ttl_ms, 1_000);
        assert_eq!(config.coordinator.throttle_ms, 250);
        assert_eq!(config.stream.user_agent.as_deref(), Some("herd"));
    }

    #[test]
    fn test_no_layers_is_default() {
        let config = HerdConfig::from_layers(std::iter::empty()).unwrap();
        assert_eq!(config, HerdConfig::default());
    }

    #[test]
    fn test_layer_with_wrong_type_fails() {
        let err = HerdConfig::from_layers([json!({"coordinator": {"ttlMs": "soon"}})]).unwrap_err();
        assert!(matches!(err, crate::Error::Json(_)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: HerdConfig =
            serde_json::from_str(r#"{"coordinator": {"ttlMs": 5000}}"#).unwrap();
        assert_eq!(config.coordinator.ttl_ms, 5000);
        assert_eq!(config.coordinator.throttle_ms, 1500);
        assert_eq!(config.stream, StreamConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herd.json");
        std::fs::write(
            &path,
            r#"{"stream": {"userAgent": "herd-test", "defaultHeaders": {"X-Api-Key": "abc"}}}"#,
        )
        .unwrap();

        let config = HerdConfig::load_from(&path).unwrap();
        assert_eq!(config.stream.user_agent.as_deref(), Some("herd-test"));
        assert_eq!(
            config.stream.default_headers.get("X-Api-Key").map(String::as_str),
            Some("abc")
        );
        assert_eq!(config.coordinator, CoordinatorConfig::default());
    }

    #[test]
    fn test_written_config_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let layer = ConfigLayer::project(dir.path(), HERD_CONFIG_FILE);
        let config = HerdConfig::new()
            .ttl_ms(2_000)
            .throttle_ms(0)
            .header("Authorization", "Bearer t");

        layer.write(&config).unwrap();
        let reloaded = HerdConfig::load_from(layer.path()).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = HerdConfig::load_from(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
