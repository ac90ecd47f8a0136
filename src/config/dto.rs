//! TOML デシリアライズ用の DTO (Data Transfer Object)
//!
//! # 責務
//!
//! このモジュールは、TOML ファイルからのデータ読み込み専用の構造体を提供します。
//! DTO はバリデーション前の「生データ」を表現し、ドメインモデルとは分離されています。
//!
//! ## 変換フロー
//!
//! ```text
//! TOML ファイル
//!   ↓ (デシリアライズ)
//! WorkflowDto
//!   ↓ (TryFrom でバリデーション)
//! Workflow (ドメインモデル)
//! ```

use serde::{Deserialize, Serialize};

/// ワークフロー DTO
///
/// TOML の `[workflow]` セクションと `[[states]]` 配列をデシリアライズ/シリアライズします。
///
/// **注**: この構造体は config モジュール内部の実装詳細です。
/// 外部からは [`Workflow`](super::workflow::Workflow) を使用してください。
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WorkflowDto {
    /// ワークフローのメタデータ
    pub(super) workflow: WorkflowMetadataDto,
    /// ステートの配列
    pub(super) states: Vec<WorkflowStateDto>,
}

/// ワークフローメタデータ DTO
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WorkflowMetadataDto {
    pub(super) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) version: Option<String>,
    pub(super) start_at: String,
}

/// ワークフローステート DTO
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WorkflowStateDto {
    pub(super) name: String,
    /// `task` または `pass`
    pub(super) kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) end: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) retry: Vec<RetryDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) catch: Vec<CatchDto>,
}

/// リトライポリシー DTO
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct RetryDto {
    pub(super) error_equals: Vec<String>,
    pub(super) max_attempts: u32,
    pub(super) interval_secs: u64,
    pub(super) backoff_rate: f64,
}

/// キャッチルール DTO
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CatchDto {
    pub(super) error_equals: Vec<String>,
    pub(super) next: String,
}
