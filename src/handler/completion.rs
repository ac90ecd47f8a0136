//! 完了通知ステップ（`notify-completion`）
//!
//! 前ステップの `body` から必要な項目だけを拾い、固定の項目を加えて
//! ワークフローの最終サマリーを作ります。各項目は個別に既定値（`""` / `0`）へ
//! フォールバックします。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InvocationError;
use super::traits::{InvocationContext, StepHandler, StepResponse, body_of, str_field};

pub const STEP_NAME: &str = "notify-completion";
pub const WORKFLOW_STATUS_COMPLETED: &str = "completed";
pub const COMPLETION_MESSAGE: &str = "Workflow completed successfully!";
pub const TOTAL_STEPS: u32 = 3;

/// 完了通知ステップの入力
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionInput {
    pub original_greeting: String,
    pub processing_time: f64,
    pub word_count: u64,
    pub character_count: u64,
}

fn count_field(body: &Value, key: &str) -> Option<u64> {
    let value = body.get(key)?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

impl CompletionInput {
    pub fn from_event(event: &Value) -> Self {
        let Some(body) = body_of(event) else {
            return Self::default();
        };

        Self {
            original_greeting: str_field(body, "original_greeting")
                .unwrap_or_default()
                .to_string(),
            processing_time: body
                .get("processing_time")
                .and_then(Value::as_f64)
                .unwrap_or_default(),
            word_count: count_field(body, "word_count").unwrap_or_default(),
            character_count: count_field(body, "character_count").unwrap_or_default(),
        }
    }
}

/// ワークフローのサマリー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub original_greeting: String,
    pub processing_time: f64,
    pub word_count: u64,
    pub character_count: u64,
    pub total_steps: u32,
    pub completion_message: String,
}

/// 完了通知ステップの出力 `body`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionBody {
    pub workflow_status: String,
    pub final_step: String,
    pub summary: Summary,
    pub timestamp: String,
}

/// サマリーを組み立てる
pub fn summarize(input: &CompletionInput, request_id: &str) -> StepResponse<CompletionBody> {
    StepResponse::ok(CompletionBody {
        workflow_status: WORKFLOW_STATUS_COMPLETED.to_string(),
        final_step: STEP_NAME.to_string(),
        summary: Summary {
            original_greeting: input.original_greeting.clone(),
            processing_time: input.processing_time,
            word_count: input.word_count,
            character_count: input.character_count,
            total_steps: TOTAL_STEPS,
            completion_message: COMPLETION_MESSAGE.to_string(),
        },
        timestamp: request_id.to_string(),
    })
}

/// 完了通知ステップのハンドラー
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionStep;

#[async_trait]
impl StepHandler for CompletionStep {
    fn name(&self) -> &'static str {
        STEP_NAME
    }

    async fn invoke(&self, event: Value, ctx: &InvocationContext) -> Result<Value, InvocationError> {
        tracing::debug!(step = STEP_NAME, request_id = %ctx.request_id, %event, "イベントを受信しました");

        let response = summarize(&CompletionInput::from_event(&event), &ctx.request_id);

        tracing::debug!(step = STEP_NAME, "レスポンスを返します");
        response.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_summary_with_processed_data() {
        let ctx = InvocationContext::new("test-request-id-123", "notify-completion-function");
        let event = json!({
            "body": {
                "original_greeting": "Hello, World!",
                "processed_at": "test-timestamp-123",
                "processing_time": 1.5,
                "word_count": 2,
                "character_count": 13,
                "step": "process-data",
                "status": "completed"
            }
        });

        let output = CompletionStep.invoke(event, &ctx).await.unwrap();

        assert_eq!(
            output,
            json!({
                "statusCode": 200,
                "body": {
                    "workflow_status": "completed",
                    "final_step": "notify-completion",
                    "summary": {
                        "original_greeting": "Hello, World!",
                        "processing_time": 1.5,
                        "word_count": 2,
                        "character_count": 13,
                        "total_steps": 3,
                        "completion_message": "Workflow completed successfully!"
                    },
                    "timestamp": "test-request-id-123"
                }
            })
        );
    }

    #[test]
    fn test_missing_body_uses_defaults() {
        let response = summarize(&CompletionInput::from_event(&json!({})), "r");
        let summary = response.body.summary;

        assert_eq!(summary.original_greeting, "");
        assert_eq!(summary.processing_time, 0.0);
        assert_eq!(summary.word_count, 0);
        assert_eq!(summary.character_count, 0);
        assert_eq!(summary.total_steps, 3);
        assert_eq!(summary.completion_message, COMPLETION_MESSAGE);
        assert_eq!(response.body.workflow_status, "completed");
        assert_eq!(response.body.final_step, "notify-completion");
    }

    #[test]
    fn test_partial_body_defaults_independently() {
        let input = CompletionInput::from_event(&json!({
            "body": { "original_greeting": "Hi there", "processing_time": 0.8 }
        }));

        assert_eq!(
            input,
            CompletionInput {
                original_greeting: "Hi there".to_string(),
                processing_time: 0.8,
                word_count: 0,
                character_count: 0,
            }
        );
    }

    #[test]
    fn test_wrong_types_fall_back_to_defaults() {
        let input = CompletionInput::from_event(&json!({
            "body": {
                "original_greeting": 12,
                "processing_time": "slow",
                "word_count": -1,
                "character_count": 4.0
            }
        }));

        assert_eq!(input.original_greeting, "");
        assert_eq!(input.processing_time, 0.0);
        assert_eq!(input.word_count, 0);
        assert_eq!(input.character_count, 4);
    }

    #[test]
    fn test_non_object_body_uses_defaults() {
        assert_eq!(
            CompletionInput::from_event(&json!({ "body": null })),
            CompletionInput::default()
        );
        assert_eq!(
            CompletionInput::from_event(&json!([1, 2, 3])),
            CompletionInput::default()
        );
    }
}
