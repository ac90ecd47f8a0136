//! データ処理ステップ（`process-data`）
//!
//! 前ステップの `body.greeting` から単語数・文字数を数え、模擬的な処理時間だけ
//! 待機してから結果を返します。この待機がワークフロー内で唯一の中断点です。
//!
//! # 数え方
//!
//! - 単語数: 半角スペース 1 文字で分割した要素数。空文字列は 1、
//!   連続したスペースの間の空要素も数えます
//! - 文字数: UTF-16 コード単位の数

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InvocationError;
use super::traits::{InvocationContext, StepHandler, StepResponse, body_of, str_field};

pub const STEP_NAME: &str = "process-data";
pub const STATUS_COMPLETED: &str = "completed";

// 処理時間は 0.01 秒単位で [0.50, 2.00) から選ぶ
const MIN_PROCESSING_HUNDREDTHS: u32 = 50;
const MAX_PROCESSING_HUNDREDTHS: u32 = 200;

/// データ処理ステップの入力
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingInput {
    pub greeting: String,
    pub timestamp: String,
}

impl ProcessingInput {
    pub fn from_event(event: &Value) -> Self {
        let body = body_of(event);
        let field = |key: &str| {
            body.and_then(|b| str_field(b, key))
                .unwrap_or_default()
                .to_string()
        };

        Self {
            greeting: field("greeting"),
            timestamp: field("timestamp"),
        }
    }
}

/// データ処理ステップの出力 `body`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBody {
    pub original_greeting: String,
    pub processed_at: String,
    pub processing_time: f64,
    pub word_count: usize,
    pub character_count: usize,
    pub step: String,
    pub status: String,
}

/// 半角スペース区切りの要素数
pub fn word_count(text: &str) -> usize {
    text.split(' ').count()
}

/// UTF-16 コード単位での長さ
pub fn character_count(text: &str) -> usize {
    text.encode_utf16().count()
}

/// 処理時間（秒）を抽選する
pub fn sample_processing_time<R: Rng>(rng: &mut R) -> f64 {
    let hundredths = rng.random_range(MIN_PROCESSING_HUNDREDTHS..MAX_PROCESSING_HUNDREDTHS);
    f64::from(hundredths) / 100.0
}

/// 入力と処理時間から出力を組み立てる（待機は行わない）
pub fn process(input: &ProcessingInput, processing_time: f64) -> StepResponse<ProcessedBody> {
    StepResponse::ok(ProcessedBody {
        original_greeting: input.greeting.clone(),
        processed_at: input.timestamp.clone(),
        processing_time,
        word_count: word_count(&input.greeting),
        character_count: character_count(&input.greeting),
        step: STEP_NAME.to_string(),
        status: STATUS_COMPLETED.to_string(),
    })
}

/// データ処理ステップのハンドラー
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessingStep;

#[async_trait]
impl StepHandler for ProcessingStep {
    fn name(&self) -> &'static str {
        STEP_NAME
    }

    async fn invoke(&self, event: Value, ctx: &InvocationContext) -> Result<Value, InvocationError> {
        tracing::debug!(step = STEP_NAME, request_id = %ctx.request_id, %event, "イベントを受信しました");

        let input = ProcessingInput::from_event(&event);
        let processing_time = sample_processing_time(&mut rand::rng());

        tracing::debug!(step = STEP_NAME, processing_time, "処理を模擬しています");
        tokio::time::sleep(Duration::from_secs_f64(processing_time)).await;

        let response = process(&input, processing_time);
        tracing::debug!(
            step = STEP_NAME,
            word_count = response.body.word_count,
            character_count = response.body.character_count,
            "レスポンスを返します"
        );
        response.into_value()
    }
}
