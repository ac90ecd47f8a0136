//! ローカル実行エンジン
//!
//! # 責務
//!
//! このモジュールは、宣言されたステートマシンを手元で 1 回実行する
//! `WorkflowExecutor` を提供します。マネージドなオーケストレーターの代役であり、
//! 宣言どおりの遷移・リトライ・キャッチを適用するだけで、独自の再試行戦略は
//! 持ちません。
//!
//! # 実行フロー
//!
//! 1. `start_at` のステートから開始
//! 2. Task ステートはハンドラーを呼び出す
//!    - 制限時間があれば `States.Timeout` で打ち切る
//!    - エラー名に一致するリトライポリシーがあれば `interval * backoff_rate^(n-1)` 待って再試行
//!    - 再試行が尽きたらキャッチルールの遷移先へ `{"Error", "Cause"}` を渡す
//! 3. Pass ステートは入力をそのまま出力する
//! 4. 出力を次のステートの入力として引き継ぎ、`end` で終了
//!
//! # 使用例
//!
//! ```rust,no_run
//! use hello_workflow::config::workflow::Workflow;
//! use hello_workflow::engine::executor::WorkflowExecutor;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = WorkflowExecutor::new(Workflow::hello_world());
//!     let result = executor.execute("local-run", json!({ "name": "Alice" })).await?;
//!
//!     println!("{}", result.output["body"]["summary"]["original_greeting"]);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use serde_json::{Value, json};

use crate::config::step::{StateKind, WorkflowState};
use crate::config::workflow::Workflow;
use crate::engine::context::ExecutionContext;
use crate::engine::result::{ExecutionError, ExecutionStatus, StepResult, StepStatus, WorkflowResult};
use crate::error::InvocationError;
use crate::handler::{HandlerRegistry, InvocationContext, StepHandler, function_name};

/// ワークフロー実行エンジン
///
/// # フィールド
///
/// - `workflow`: 実行するワークフロー定義
/// - `registry`: リソース名とハンドラーの対応表
#[derive(Debug, Clone)]
pub struct WorkflowExecutor {
    workflow: Arc<Workflow>,
    registry: HandlerRegistry,
}

impl WorkflowExecutor {
    /// 組み込みハンドラーでエグゼキューターを生成
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
            registry: HandlerRegistry::default(),
        }
    }

    /// ハンドラーレジストリを差し替える
    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// すべての Task ステートにハンドラーがあることを確認
    pub fn check_resources(&self) -> Result<(), ExecutionError> {
        for state in self.workflow.states() {
            if let Some(resource) = state.resource() {
                if !self.registry.contains(resource) {
                    return Err(ExecutionError::UnknownResource {
                        state_name: state.name().to_string(),
                        resource: resource.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// ワークフローを実行
    ///
    /// 捕捉されたエラーはエラー処理ステートへの遷移として扱われ、実行自体は
    /// 成功します。捕捉されなかったエラーは [`ExecutionError::StepFailed`] を返します。
    pub async fn execute(&self, execution_name: &str, input: Value) -> Result<WorkflowResult, ExecutionError> {
        self.check_resources()?;

        let mut context = ExecutionContext::new(self.workflow.name(), execution_name);
        let mut payload = input;
        let mut current = self.workflow.start_at().to_string();

        tracing::info!(
            workflow = self.workflow.name(),
            execution = execution_name,
            "ワークフローの実行を開始します"
        );

        loop {
            let state = self.workflow.state(&current).ok_or_else(|| {
                ExecutionError::ContextError(format!("ステート '{current}' が定義にありません"))
            })?;
            let index = context.next_index();
            let state_start = tokio::time::Instant::now();

            let next = match state.kind() {
                StateKind::Pass => {
                    tracing::info!(state = state.name(), "Pass ステートを通過します");
                    context.record_step(StepResult {
                        state_name: state.name().to_string(),
                        index,
                        status: StepStatus::Success,
                        output: Some(payload.clone()),
                        duration: state_start.elapsed(),
                        retry_count: 0,
                        error: None,
                    });
                    state.next().map(str::to_string)
                }
                StateKind::Task { resource, .. } => {
                    let outcome = self.execute_task_with_retry(state, resource, &payload, &mut context).await;
                    let retries = context.get_retry_count(state.name());

                    match outcome {
                        Ok(output) => {
                            context.record_step(StepResult {
                                state_name: state.name().to_string(),
                                index,
                                status: if retries > 0 {
                                    StepStatus::Retried { attempts: retries }
                                } else {
                                    StepStatus::Success
                                },
                                output: Some(output.clone()),
                                duration: state_start.elapsed(),
                                retry_count: retries,
                                error: None,
                            });
                            payload = output;
                            state.next().map(str::to_string)
                        }
                        Err(error) => {
                            let error_name = error.error_name();
                            let caught = state.catch_rule_for(error_name);
                            context.record_step(StepResult {
                                state_name: state.name().to_string(),
                                index,
                                status: if caught.is_some() { StepStatus::Caught } else { StepStatus::Failed },
                                output: None,
                                duration: state_start.elapsed(),
                                retry_count: retries,
                                error: Some(error.to_string()),
                            });

                            let Some(rule) = caught else {
                                tracing::error!(
                                    state = state.name(),
                                    error = error_name,
                                    "捕捉されないエラーで実行が失敗しました"
                                );
                                return Err(ExecutionError::StepFailed {
                                    state_name: state.name().to_string(),
                                    source: error,
                                });
                            };

                            tracing::warn!(
                                state = state.name(),
                                error = error_name,
                                next = rule.next(),
                                "エラーを捕捉して遷移します"
                            );
                            payload = json!({
                                "Error": error_name,
                                "Cause": error.to_string(),
                            });
                            Some(rule.next().to_string())
                        }
                    }
                }
            };

            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        tracing::info!(
            workflow = context.workflow_name(),
            execution = context.execution_name(),
            states = context.steps().len(),
            retries = context.total_retries(),
            "ワークフローの実行が完了しました"
        );

        Ok(context.into_result(ExecutionStatus::Succeeded, payload))
    }

    /// リトライ付きで Task ステートを実行（プライベートメソッド）
    ///
    /// 再試行のたびにコンテキストのリトライ回数を加算します。
    async fn execute_task_with_retry(
        &self,
        state: &WorkflowState,
        resource: &str,
        payload: &Value,
        context: &mut ExecutionContext,
    ) -> Result<Value, InvocationError> {
        let mut retries = 0;

        loop {
            match self.invoke_task(state, resource, payload).await {
                Ok(output) => return Ok(output),
                Err(error) => {
                    let policy = state
                        .retry_policy_for(error.error_name())
                        .filter(|p| retries < p.max_attempts());
                    let Some(policy) = policy else {
                        return Err(error);
                    };

                    retries += 1;
                    context.increment_retry(state.name());
                    let delay = policy.delay_for(retries);
                    tracing::warn!(
                        state = state.name(),
                        error = %error,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        "ステップが失敗したため再試行します"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// 制限時間付きでハンドラーを呼び出す（プライベートメソッド）
    async fn invoke_task(
        &self,
        state: &WorkflowState,
        resource: &str,
        payload: &Value,
    ) -> Result<Value, InvocationError> {
        let handler: Arc<dyn StepHandler> = self.registry.get(resource).ok_or_else(|| {
            InvocationError::TaskFailed(format!("リソース '{resource}' のハンドラーがありません"))
        })?;
        let ctx = InvocationContext::generate(function_name(resource));

        tracing::debug!(
            state = state.name(),
            resource,
            request_id = %ctx.request_id,
            "ステップを呼び出します"
        );

        match state.timeout() {
            Some(limit) => tokio::time::timeout(limit, handler.invoke(payload.clone(), &ctx))
                .await
                .unwrap_or(Err(InvocationError::Timeout {
                    timeout_secs: limit.as_secs(),
                })),
            None => handler.invoke(payload.clone(), &ctx).await,
        }
    }
}

impl From<Workflow> for WorkflowExecutor {
    fn from(workflow: Workflow) -> Self {
        Self::new(workflow)
    }
}
