//! ワークフロー実行エンジン
//!
//! # 責務
//!
//! - ワークフロー定義を受け取り、`start_at` からステートを順にたどって実行
//! - ステート間の出力の受け渡し
//! - 宣言されたリトライ・キャッチ・制限時間の適用
//! - 実行の開始・状態取得・停止とポーリング
//!
//! # モジュール構成
//!
//! - [`executor`][]: ワークフロー実行エンジン本体
//! - [`context`][]: ステート実行コンテキスト
//! - [`result`][]: 実行結果型とエラー型
//! - [`orchestrator`][]: 実行管理とポーリング
//!
//! # 使用例
//!
//! ```rust,no_run
//! use hello_workflow::config::workflow::Workflow;
//! use hello_workflow::engine::{LocalOrchestrator, Orchestrator, PollConfig, WorkflowExecutor, wait_for_completion};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workflow = Workflow::from_file("workflows/hello-world.toml")?;
//!     let orchestrator = LocalOrchestrator::new(WorkflowExecutor::new(workflow));
//!
//!     let handle = orchestrator
//!         .start_execution(Some("demo"), json!({ "name": "Alice", "message": "Hi" }))
//!         .await?;
//!     let description = wait_for_completion(&orchestrator, &handle.execution_id, PollConfig::default()).await?;
//!
//!     println!("Status: {}", description.status);
//!     println!("Output: {:?}", description.output);
//!     Ok(())
//! }
//! ```

pub mod result;
pub mod context;
pub mod executor;
pub mod orchestrator;

pub use context::ExecutionContext;
pub use executor::WorkflowExecutor;
pub use orchestrator::{ExecutionHandle, LocalOrchestrator, Orchestrator, PollConfig, wait_for_completion};
pub use result::{ExecutionDescription, ExecutionError, ExecutionStatus, StepResult, StepStatus, WorkflowResult};
