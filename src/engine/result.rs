//! ワークフロー実行結果の型定義
//!
//! # 責務
//!
//! - ステート実行結果 [`StepResult`] の型定義
//! - ワークフロー実行結果 [`WorkflowResult`] の型定義
//! - オーケストレーターが返す実行記述 [`ExecutionDescription`] の型定義
//! - 実行ステータス [`ExecutionStatus`] と [`StepStatus`] の型定義
//! - 実行エラー [`ExecutionError`] の型定義
//!
//! # 使用例
//!
//! ```rust,no_run
//! use hello_workflow::engine::result::WorkflowResult;
//!
//! fn handle_result(result: WorkflowResult) {
//!     if result.is_success() {
//!         println!("ワークフロー成功: {}", result.workflow_name);
//!         println!("完了ステート数: {}/{}", result.completed_steps(), result.steps.len());
//!         println!("実行時間: {:?}", result.total_duration);
//!     }
//!
//!     if let Ok(json) = result.to_json() {
//!         println!("JSON: {}", json);
//!     }
//! }
//! ```

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::error::{ConfigError, InvocationError};

/// ワークフロー実行結果
///
/// 1 回の実行で通過した各ステートの結果と最終出力を含みます。
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    /// ワークフロー名
    pub workflow_name: String,

    /// 実行名
    pub execution_name: String,

    /// 実行ステータス
    pub status: ExecutionStatus,

    /// 通過した各ステートの実行結果（実行順）
    pub steps: Vec<StepResult>,

    /// 最終ステートの出力
    pub output: Value,

    /// 実行開始時刻
    pub start_time: SystemTime,

    /// 実行終了時刻
    pub end_time: SystemTime,

    /// 総実行時間
    pub total_duration: Duration,
}

impl WorkflowResult {
    /// 結果をJSON形式でシリアライズ
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 成功したかどうか
    pub fn is_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Succeeded)
    }

    /// 完了したステート数
    ///
    /// [`StepStatus::Success`] または [`StepStatus::Retried`] のステート数
    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| {
                matches!(step.status, StepStatus::Success | StepStatus::Retried { .. })
            })
            .count()
    }

    /// エラー処理ステートへ遷移したかどうか
    pub fn caught_error(&self) -> bool {
        self.steps.iter().any(|step| step.status == StepStatus::Caught)
    }
}

/// ステート実行結果
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// ステート名
    pub state_name: String,

    /// 通過順のインデックス（0始まり）
    pub index: usize,

    /// 実行ステータス
    pub status: StepStatus,

    /// ステートの出力（成功時のみ）
    pub output: Option<Value>,

    /// 実行時間（リトライ待機を含む）
    pub duration: Duration,

    /// リトライ回数
    pub retry_count: u32,

    /// エラーメッセージ（失敗時のみ）
    pub error: Option<String>,
}

/// 実行ステータス
///
/// オーケストレーターのステータス表記（`SUCCEEDED` など）でシリアライズされます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Aborted,
}

impl ExecutionStatus {
    /// 終了状態かどうか
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
            Self::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ステート実行ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    /// 成功（リトライなし）
    Success,

    /// リトライ後に成功
    Retried {
        /// リトライ回数
        attempts: u32,
    },

    /// 失敗し、キャッチルールでエラー処理ステートへ遷移
    Caught,

    /// 失敗（捕捉されず実行全体が失敗）
    Failed,
}

/// オーケストレーターが返す実行の記述
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionDescription {
    /// 実行 ID
    pub execution_id: String,

    /// 実行名
    pub name: String,

    /// ワークフロー名
    pub workflow_name: String,

    /// 実行ステータス
    pub status: ExecutionStatus,

    /// 実行開始時の入力
    pub input: Value,

    /// 最終出力（成功時のみ）
    pub output: Option<Value>,

    /// エラーメッセージ（失敗時のみ）
    pub error: Option<String>,

    /// 開始時刻
    pub start_date: SystemTime,

    /// 終了時刻（終了状態のみ）
    pub stop_date: Option<SystemTime>,
}

/// 実行エラー
///
/// # エラー種別
///
/// - [`ExecutionError::ConfigError`] - 設定エラー（ワークフロー定義の不備等）
/// - [`ExecutionError::UnknownResource`] - ハンドラー未登録のリソース
/// - [`ExecutionError::StepFailed`] - 捕捉されなかったステップ失敗
/// - [`ExecutionError::ExecutionAlreadyExists`] - 同名の実行が既に存在
/// - [`ExecutionError::ExecutionNotFound`] - 実行 ID が不明
/// - [`ExecutionError::PollExhausted`] - ポーリング回数内に終了しなかった
/// - [`ExecutionError::Serialization`] - JSON 変換エラー
/// - [`ExecutionError::ContextError`] - 実行中の内部不整合
#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum ExecutionError {
    /// 設定エラー
    #[error("設定エラー: {0}")]
    ConfigError(#[from] ConfigError),

    /// ハンドラー未登録のリソース
    #[error("ステート '{state_name}' のリソース '{resource}' に対応するハンドラーがありません")]
    UnknownResource {
        state_name: String,
        resource: String,
    },

    /// 捕捉されなかったステップ失敗
    #[error("ステート '{state_name}' が失敗しました（{}）: {source}", .source.error_name())]
    StepFailed {
        state_name: String,
        #[source]
        source: InvocationError,
    },

    /// 同名の実行が既に存在
    #[error("実行 '{0}' は既に存在します")]
    ExecutionAlreadyExists(String),

    /// 実行 ID が不明
    #[error("実行 '{0}' が見つかりません")]
    ExecutionNotFound(String),

    /// ポーリング回数内に終了しなかった
    #[error("実行 '{execution_id}' が {attempts} 回のポーリング内に完了しませんでした")]
    PollExhausted {
        execution_id: String,
        attempts: u32,
    },

    /// JSON 変換エラー
    #[error("JSON の変換に失敗しました: {0}")]
    Serialization(#[from] serde_json::Error),

    /// コンテキストエラー
    #[error("コンテキストエラー: {0}")]
    ContextError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(name: &str, status: StepStatus) -> StepResult {
        StepResult {
            state_name: name.to_string(),
            index: 0,
            status,
            output: None,
            duration: Duration::from_secs(1),
            retry_count: 0,
            error: None,
        }
    }

    #[test]
    fn test_completed_steps_count() {
        let result = WorkflowResult {
            workflow_name: "test_workflow".to_string(),
            execution_name: "exec".to_string(),
            status: ExecutionStatus::Succeeded,
            steps: vec![
                step("HelloWorld", StepStatus::Success),
                step("ProcessData", StepStatus::Retried { attempts: 2 }),
                step("NotifyCompletion", StepStatus::Caught),
                step("HandleError", StepStatus::Success),
            ],
            output: json!({}),
            start_time: SystemTime::now(),
            end_time: SystemTime::now(),
            total_duration: Duration::from_secs(3),
        };

        assert!(result.is_success());
        assert!(result.caught_error());
        assert_eq!(result.completed_steps(), 3);
    }

    #[test]
    fn test_execution_status_serialization() {
        assert_eq!(serde_json::to_value(ExecutionStatus::TimedOut).unwrap(), json!("TIMED_OUT"));
        assert_eq!(ExecutionStatus::Succeeded.to_string(), "SUCCEEDED");
        assert!(ExecutionStatus::Aborted.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
    }

    #[test]
    fn test_execution_error_step_failed() {
        let err = ExecutionError::StepFailed {
            state_name: "ProcessData".to_string(),
            source: InvocationError::ServiceException("boom".to_string()),
        };

        assert_eq!(
            err.to_string(),
            "ステート 'ProcessData' が失敗しました（Lambda.ServiceException）: サービス例外: boom"
        );
    }

    #[test]
    fn test_execution_error_config_error() {
        let exec_err = ExecutionError::from(ConfigError::Validation("無効な設定".to_string()));

        assert!(matches!(exec_err, ExecutionError::ConfigError(_)));
        assert_eq!(
            exec_err.to_string(),
            "設定エラー: 設定のバリデーションに失敗しました: 無効な設定"
        );
    }
}
