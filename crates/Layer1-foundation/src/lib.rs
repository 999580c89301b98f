//! # herd-foundation
//!
//! Foundation layer for herd:
//! - Error: 공통 에러 타입 (Error, Result)
//! - Config: 통합 설정 (HerdConfig, CoordinatorConfig, StreamConfig) + 설정 레이어 (ConfigLayer)
//! - Cache: 요청 캐시 키 (CacheKey, build_key)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  UI / CLI                                               │
//! │        │                          │                     │
//! │        ▼                          ▼                     │
//! │  RequestCoordinator         StreamSession               │
//! │  (cache, inflight,          (one live stream            │
//! │   throttle)                  per operation)             │
//! │        │                          │                     │
//! │        ▼                          ▼                     │
//! │  CacheKey (this crate)      StreamIngestor → EventSink  │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod error;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{ConfigLayer, CoordinatorConfig, HerdConfig, StreamConfig, HERD_CONFIG_FILE};

// ============================================================================
// Cache (캐시 키)
// ============================================================================
pub use cache::{build_key, try_build_key, CacheKey};
