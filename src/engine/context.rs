//! ステート実行コンテキストの管理
//!
//! # 責務
//!
//! - 通過したステートの実行結果を実行順に保持
//! - ステートごとのリトライ回数の累積
//! - 実行終了時に [`WorkflowResult`] を組み立てる
//!
//! コンテキストは 1 回の実行に閉じており、実行間で共有されません。
//!
//! # 使用例
//!
//! ```rust
//! use hello_workflow::engine::context::ExecutionContext;
//! use hello_workflow::engine::result::{ExecutionStatus, StepResult, StepStatus};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let mut ctx = ExecutionContext::new("hello-world-workflow", "exec-1");
//!
//! ctx.increment_retry("HelloWorld");
//! ctx.record_step(StepResult {
//!     state_name: "HelloWorld".to_string(),
//!     index: ctx.next_index(),
//!     status: StepStatus::Retried { attempts: 1 },
//!     output: Some(json!({ "statusCode": 200 })),
//!     duration: Duration::from_millis(5),
//!     retry_count: ctx.get_retry_count("HelloWorld"),
//!     error: None,
//! });
//!
//! let result = ctx.into_result(ExecutionStatus::Succeeded, json!({}));
//! assert_eq!(result.steps[0].retry_count, 1);
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::engine::result::{ExecutionStatus, StepResult, WorkflowResult};

/// ステート実行コンテキスト
///
/// # フィールド
///
/// - `workflow_name`: 実行中のワークフロー名
/// - `execution_name`: 実行名
/// - `start_time`: 実行開始時刻
/// - `steps`: 通過したステートの実行結果（実行順）
/// - `retry_counts`: ステート名をキーとしたリトライ回数のマップ
#[derive(Debug)]
pub struct ExecutionContext {
    workflow_name: String,
    execution_name: String,
    start_time: SystemTime,

    // ステート実行履歴
    steps: Vec<StepResult>,

    retry_counts: HashMap<String, u32>,
}

impl ExecutionContext {
    /// 新しい実行コンテキストを生成
    pub fn new(workflow_name: impl Into<String>, execution_name: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            execution_name: execution_name.into(),
            start_time: SystemTime::now(),
            steps: Vec::new(),
            retry_counts: HashMap::new(),
        }
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn execution_name(&self) -> &str {
        &self.execution_name
    }

    /// 次に記録するステートの通過順インデックス
    pub fn next_index(&self) -> usize {
        self.steps.len()
    }

    /// ステートの実行結果を記録
    pub fn record_step(&mut self, step: StepResult) {
        self.steps.push(step);
    }

    /// 記録済みのステート実行結果（実行順）
    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// リトライ回数をインクリメント
    pub fn increment_retry(&mut self, state_name: &str) {
        *self.retry_counts.entry(state_name.to_string()).or_insert(0) += 1;
    }

    /// ステートのリトライ回数
    pub fn get_retry_count(&self, state_name: &str) -> u32 {
        self.retry_counts.get(state_name).copied().unwrap_or(0)
    }

    /// 全ステートのリトライ回数の合計
    pub fn total_retries(&self) -> u32 {
        self.retry_counts.values().sum()
    }

    /// コンテキストを実行結果に変換
    pub fn into_result(self, status: ExecutionStatus, output: Value) -> WorkflowResult {
        let end_time = SystemTime::now();
        let total_duration = end_time
            .duration_since(self.start_time)
            .unwrap_or(Duration::from_secs(0));

        WorkflowResult {
            workflow_name: self.workflow_name,
            execution_name: self.execution_name,
            status,
            steps: self.steps,
            output,
            start_time: self.start_time,
            end_time,
            total_duration,
        }
    }
}
