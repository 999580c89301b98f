//! Config layers - 설정 파일 위치와 JSON 병합
//!
//! 설정은 레이어 단위로 읽습니다 (글로벌 → 프로젝트). 각 레이어는 타입으로
//! 변환하기 전에 raw JSON 상태로 병합되므로, 파일에 적힌 필드만 아래 레이어를
//! 덮어씁니다. 기본값과 같은 값이라도 명시했다면 우선합니다.

use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// 글로벌 설정 디렉토리 이름 (`~/.config/herd`)
pub const HERD_DIR_NAME: &str = "herd";

/// 프로젝트 설정 디렉토리 이름 (`./.herd`)
pub const HERD_PROJECT_DIR: &str = ".herd";

/// One config file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    path: PathBuf,
}

impl ConfigLayer {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/herd/<file>`
    pub fn global(file: &str) -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))?;
        Ok(Self::at(dir.join(HERD_DIR_NAME).join(file)))
    }

    /// `<root>/.herd/<file>`
    pub fn project(root: &Path, file: &str) -> Self {
        Self::at(root.join(HERD_PROJECT_DIR).join(file))
    }

    /// Project layer of the working directory
    pub fn current_project(file: &str) -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::Config(format!("Cannot get current directory: {}", e)))?;
        Ok(Self::project(&cwd, file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw JSON of this layer; `None` when the file does not exist
    pub fn read(&self) -> Result<Option<Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", self.path.display(), e)))?;
        if !value.is_object() {
            return Err(Error::Config(format!(
                "{} must contain a JSON object",
                self.path.display()
            )));
        }
        Ok(Some(value))
    }

    /// Write `data` as pretty JSON, creating parent directories
    pub fn write<T: Serialize>(&self, data: &T) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, content)
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", self.path.display(), e)))?;
        tracing::debug!(path = %self.path.display(), "Config saved");
        Ok(())
    }
}

/// Overlay `top` onto `base`: objects merge key by key, anything else replaces
pub fn merge_json(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(base), Value::Object(top)) => {
            for (key, value) in top {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, top) => *base = top,
    }
}
