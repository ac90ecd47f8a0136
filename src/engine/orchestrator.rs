//! オーケストレーター
//!
//! # 責務
//!
//! - 実行の開始・状態取得・停止を行う [`Orchestrator`] トレイト
//! - 終了状態までのポーリング [`wait_for_completion`]
//! - プロセス内で実行を管理する [`LocalOrchestrator`]
//!
//! `LocalOrchestrator` は実行ごとに tokio タスクを 1 つ起動します。実行同士が
//! 共有するのは実行記述のテーブルだけです。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::engine::executor::WorkflowExecutor;
use crate::engine::result::{ExecutionDescription, ExecutionError, ExecutionStatus};

/// ポーリングの既定回数
pub const DEFAULT_POLL_ATTEMPTS: u32 = 30;

/// ポーリングの既定間隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// 開始した実行のハンドル
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionHandle {
    pub execution_id: String,
    pub start_date: SystemTime,
}

/// 実行を管理するオーケストレーター
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// 実行を開始する
    ///
    /// `name` が `None` の場合は一意な実行名を払い出します。
    async fn start_execution(&self, name: Option<&str>, input: Value) -> Result<ExecutionHandle, ExecutionError>;

    /// 実行の現在の状態を取得する
    async fn describe_execution(&self, execution_id: &str) -> Result<ExecutionDescription, ExecutionError>;

    /// 実行を停止する（終了済みの実行には何もしない）
    async fn stop_execution(&self, execution_id: &str) -> Result<(), ExecutionError>;
}

/// ポーリング設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollConfig {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self { max_attempts, interval }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL)
    }
}

/// 実行が終了状態になるまでポーリングする
///
/// 最後の試行の後は待機しません。`max_attempts` 回で終了しなければ
/// [`ExecutionError::PollExhausted`] を返します。
pub async fn wait_for_completion<O>(
    orchestrator: &O,
    execution_id: &str,
    config: PollConfig,
) -> Result<ExecutionDescription, ExecutionError>
where
    O: Orchestrator + ?Sized,
{
    for attempt in 1..=config.max_attempts {
        let description = orchestrator.describe_execution(execution_id).await?;
        if description.status.is_terminal() {
            tracing::info!(
                execution_id,
                status = %description.status,
                attempt,
                "実行が終了しました"
            );
            return Ok(description);
        }

        tracing::debug!(execution_id, attempt, "実行中のため待機します");
        if attempt < config.max_attempts {
            tokio::time::sleep(config.interval).await;
        }
    }

    Err(ExecutionError::PollExhausted {
        execution_id: execution_id.to_string(),
        attempts: config.max_attempts,
    })
}

#[derive(Debug)]
struct ExecutionRecord {
    description: ExecutionDescription,
    task: Option<AbortHandle>,
}

/// プロセス内オーケストレーター
///
/// # フィールド
///
/// - `executor`: 全実行で共有するエグゼキューター（読み取り専用）
/// - `executions`: 実行 ID をキーとした実行記述のテーブル
/// - `execution_timeout`: 実行全体の制限時間（超えると `TIMED_OUT`）
///
/// 終了した実行の記述は自動では削除されません。長時間動かす場合は
/// [`LocalOrchestrator::forget_finished`] で定期的に取り除いてください。
#[derive(Debug, Clone)]
pub struct LocalOrchestrator {
    executor: Arc<WorkflowExecutor>,
    executions: Arc<RwLock<HashMap<String, ExecutionRecord>>>,
    execution_timeout: Option<Duration>,
}

impl LocalOrchestrator {
    pub fn new(executor: WorkflowExecutor) -> Self {
        Self {
            executor: Arc::new(executor),
            executions: Arc::new(RwLock::new(HashMap::new())),
            execution_timeout: None,
        }
    }

    /// 実行全体の制限時間を設定
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    pub fn executor(&self) -> &WorkflowExecutor {
        &self.executor
    }

    /// 実行名から実行 ID を組み立てる
    pub fn execution_id(&self, name: &str) -> String {
        format!("arn:local:states:execution:{}:{name}", self.executor.workflow().name())
    }

    /// 登録済みの実行記述（開始順は保証しない）
    pub async fn list_executions(&self) -> Vec<ExecutionDescription> {
        self.executions
            .read()
            .await
            .values()
            .map(|record| record.description.clone())
            .collect()
    }

    /// 終了状態の実行記述をテーブルから取り除き、取り除いた件数を返す
    pub async fn forget_finished(&self) -> usize {
        let mut table = self.executions.write().await;
        let before = table.len();
        table.retain(|_, record| !record.description.status.is_terminal());
        let removed = before - table.len();

        tracing::debug!(removed, "終了した実行記述を削除しました");
        removed
    }
}

/// 実行タスク本体（終了時に実行記述を更新する）
async fn run_execution(
    executor: Arc<WorkflowExecutor>,
    executions: Arc<RwLock<HashMap<String, ExecutionRecord>>>,
    execution_id: String,
    name: String,
    input: Value,
    timeout: Option<Duration>,
) {
    let run = executor.execute(&name, input);
    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, run).await.ok(),
        None => Some(run.await),
    };

    let (status, output, error) = match outcome {
        Some(Ok(result)) => (result.status, Some(result.output), None),
        Some(Err(err)) => (ExecutionStatus::Failed, None, Some(err.to_string())),
        None => (
            ExecutionStatus::TimedOut,
            None,
            Some("実行が制限時間を超えました".to_string()),
        ),
    };

    let mut table = executions.write().await;
    if let Some(record) = table.get_mut(&execution_id) {
        if record.description.status.is_terminal() {
            return;
        }
        record.description.status = status;
        record.description.output = output;
        record.description.error = error;
        record.description.stop_date = Some(SystemTime::now());
        record.task = None;
    }

    tracing::info!(execution_id = %execution_id, %status, "実行記述を更新しました");
}

#[async_trait]
impl Orchestrator for LocalOrchestrator {
    async fn start_execution(&self, name: Option<&str>, input: Value) -> Result<ExecutionHandle, ExecutionError> {
        self.executor.check_resources()?;

        let name = name.map(str::to_string).unwrap_or_else(|| Uuid::new_v4().to_string());
        let execution_id = self.execution_id(&name);
        let start_date = SystemTime::now();

        let mut table = self.executions.write().await;
        if table.contains_key(&execution_id) {
            return Err(ExecutionError::ExecutionAlreadyExists(name));
        }

        table.insert(
            execution_id.clone(),
            ExecutionRecord {
                description: ExecutionDescription {
                    execution_id: execution_id.clone(),
                    name: name.clone(),
                    workflow_name: self.executor.workflow().name().to_string(),
                    status: ExecutionStatus::Running,
                    input: input.clone(),
                    output: None,
                    error: None,
                    start_date,
                    stop_date: None,
                },
                task: None,
            },
        );

        tracing::info!(execution_id = %execution_id, "実行を開始します");

        // テーブルのロックを保持したまま起動し、タスク側の更新を待たせる
        let handle = tokio::spawn(run_execution(
            Arc::clone(&self.executor),
            Arc::clone(&self.executions),
            execution_id.clone(),
            name,
            input,
            self.execution_timeout,
        ));
        if let Some(record) = table.get_mut(&execution_id) {
            record.task = Some(handle.abort_handle());
        }

        Ok(ExecutionHandle {
            execution_id,
            start_date,
        })
    }

    async fn describe_execution(&self, execution_id: &str) -> Result<ExecutionDescription, ExecutionError> {
        self.executions
            .read()
            .await
            .get(execution_id)
            .map(|record| record.description.clone())
            .ok_or_else(|| ExecutionError::ExecutionNotFound(execution_id.to_string()))
    }

    async fn stop_execution(&self, execution_id: &str) -> Result<(), ExecutionError> {
        let mut table = self.executions.write().await;
        let record = table
            .get_mut(execution_id)
            .ok_or_else(|| ExecutionError::ExecutionNotFound(execution_id.to_string()))?;

        if record.description.status.is_terminal() {
            return Ok(());
        }

        if let Some(task) = record.task.take() {
            task.abort();
        }
        record.description.status = ExecutionStatus::Aborted;
        record.description.stop_date = Some(SystemTime::now());

        tracing::warn!(execution_id, "実行を停止しました");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::workflow::Workflow;
    use crate::error::InvocationError;
    use crate::handler::{HandlerRegistry, InvocationContext, StepHandler};
    use serde_json::json;

    struct HangingHandler;

    #[async_trait]
    impl StepHandler for HangingHandler {
        fn name(&self) -> &'static str {
            "hello-world"
        }

        async fn invoke(&self, _event: Value, _ctx: &InvocationContext) -> Result<Value, InvocationError> {
            std::future::pending::<Result<Value, InvocationError>>().await
        }
    }

    struct BrokenHandler;

    #[async_trait]
    impl StepHandler for BrokenHandler {
        fn name(&self) -> &'static str {
            "hello-world"
        }

        async fn invoke(&self, _event: Value, _ctx: &InvocationContext) -> Result<Value, InvocationError> {
            Err(InvocationError::TaskFailed("壊れた".to_string()))
        }
    }

    fn orchestrator() -> LocalOrchestrator {
        LocalOrchestrator::new(WorkflowExecutor::new(Workflow::hello_world()))
    }

    fn hanging_orchestrator() -> LocalOrchestrator {
        let registry = HandlerRegistry::default().with("hello-world", Arc::new(HangingHandler));
        LocalOrchestrator::new(WorkflowExecutor::new(Workflow::hello_world()).with_registry(registry))
    }

    /// キャッチのない 1 ステートのワークフロー
    fn uncaught_workflow() -> Workflow {
        Workflow::from_toml(
            r#"
[workflow]
name = "uncaught"
start_at = "HelloWorld"

[[states]]
name = "HelloWorld"
kind = "task"
resource = "hello-world"
end = true
"#,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_succeeds() {
        let orchestrator = orchestrator();

        let handle = orchestrator
            .start_execution(Some("exec-1"), json!({ "name": "Alice", "message": "Hi" }))
            .await
            .unwrap();
        assert_eq!(
            handle.execution_id,
            "arn:local:states:execution:hello-world-workflow:exec-1"
        );

        let description = wait_for_completion(&orchestrator, &handle.execution_id, PollConfig::default())
            .await
            .unwrap();

        assert_eq!(description.status, ExecutionStatus::Succeeded);
        assert!(description.stop_date.is_some());
        let output = description.output.unwrap();
        assert_eq!(output["body"]["summary"]["original_greeting"], "Hi, Alice!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_execution_name_is_rejected() {
        let orchestrator = orchestrator();
        orchestrator.start_execution(Some("same"), json!({})).await.unwrap();

        let err = orchestrator.start_execution(Some("same"), json!({})).await.unwrap_err();

        assert!(matches!(err, ExecutionError::ExecutionAlreadyExists(name) if name == "same"));
    }

    #[tokio::test]
    async fn test_generated_execution_names_are_unique() {
        let orchestrator = orchestrator();

        let a = orchestrator.start_execution(None, json!({})).await.unwrap();
        let b = orchestrator.start_execution(None, json!({})).await.unwrap();

        assert_ne!(a.execution_id, b.execution_id);
        assert_eq!(orchestrator.list_executions().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_finished_keeps_running_executions() {
        let orchestrator = hanging_orchestrator();
        let running = orchestrator.start_execution(Some("running"), json!({})).await.unwrap();
        let stopped = orchestrator.start_execution(Some("stopped"), json!({})).await.unwrap();
        orchestrator.stop_execution(&stopped.execution_id).await.unwrap();

        assert_eq!(orchestrator.forget_finished().await, 1);

        let remaining = orchestrator.list_executions().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].execution_id, running.execution_id);
        assert!(matches!(
            orchestrator.describe_execution(&stopped.execution_id).await,
            Err(ExecutionError::ExecutionNotFound(_))
        ));
        // 削除後は同じ実行名で再開始できる
        assert!(orchestrator.start_execution(Some("stopped"), json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_describe_unknown_execution() {
        let err = orchestrator().describe_execution("missing").await.unwrap_err();

        assert!(matches!(err, ExecutionError::ExecutionNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhausted() {
        let orchestrator = hanging_orchestrator();
        let handle = orchestrator.start_execution(Some("stuck"), json!({})).await.unwrap();

        let err = wait_for_completion(&orchestrator, &handle.execution_id, PollConfig::new(3, Duration::from_secs(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::PollExhausted { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_timeout() {
        let orchestrator = hanging_orchestrator().with_execution_timeout(Duration::from_secs(10));
        let handle = orchestrator.start_execution(Some("slow"), json!({})).await.unwrap();

        let description = wait_for_completion(&orchestrator, &handle.execution_id, PollConfig::default())
            .await
            .unwrap();

        assert_eq!(description.status, ExecutionStatus::TimedOut);
        assert!(description.output.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_execution() {
        let orchestrator = hanging_orchestrator();
        let handle = orchestrator.start_execution(Some("stop-me"), json!({})).await.unwrap();

        orchestrator.stop_execution(&handle.execution_id).await.unwrap();
        let description = orchestrator.describe_execution(&handle.execution_id).await.unwrap();

        assert_eq!(description.status, ExecutionStatus::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncaught_failure_marks_execution_failed() {
        let registry = HandlerRegistry::default().with("hello-world", Arc::new(BrokenHandler));
        let orchestrator =
            LocalOrchestrator::new(WorkflowExecutor::new(uncaught_workflow()).with_registry(registry));
        let handle = orchestrator.start_execution(Some("broken"), json!({})).await.unwrap();

        let description = wait_for_completion(&orchestrator, &handle.execution_id, PollConfig::default())
            .await
            .unwrap();

        assert_eq!(description.status, ExecutionStatus::Failed);
        assert!(description.error.unwrap().contains("States.TaskFailed"));
    }
}
