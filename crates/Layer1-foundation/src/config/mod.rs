//! Configuration module
//!
//! - `herd`: 통합 설정 (HerdConfig)
//! - `layer`: 설정 파일 레이어 (글로벌/프로젝트) 읽기/쓰기와 JSON 병합

mod herd;
mod layer;

pub use herd::{CoordinatorConfig, HerdConfig, StreamConfig, HERD_CONFIG_FILE};
pub use layer::{merge_json, ConfigLayer, HERD_DIR_NAME, HERD_PROJECT_DIR};
