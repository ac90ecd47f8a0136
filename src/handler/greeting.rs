//! 挨拶ステップ（`hello-world`）
//!
//! `name` と `message` から `"{message}, {name}!"` を組み立てます。
//!
//! 空文字・空白のみの値は未指定として扱い、既定値（`World` / `Hello`）に
//! 置き換えます。空白以外を含む値は、前後の空白も含めてそのまま使います。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InvocationError;
use super::traits::{InvocationContext, StepHandler, StepResponse, str_field};

pub const STEP_NAME: &str = "hello-world";
pub const DEFAULT_NAME: &str = "World";
pub const DEFAULT_MESSAGE: &str = "Hello";

/// 挨拶ステップの入力
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GreetingInput {
    pub name: Option<String>,
    pub message: Option<String>,
}

impl GreetingInput {
    /// 任意の JSON からの読み取り。文字列でない値は未指定扱い
    pub fn from_event(event: &Value) -> Self {
        Self {
            name: str_field(event, "name").map(str::to_string),
            message: str_field(event, "message").map(str::to_string),
        }
    }
}

/// 挨拶ステップの出力 `body`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingBody {
    pub greeting: String,
    pub timestamp: String,
    pub step: String,
    pub processed: bool,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// 挨拶文を組み立てる
///
/// ```rust
/// use hello_workflow::handler::greeting::{GreetingInput, greet};
///
/// let response = greet(&GreetingInput::default(), "req-1");
/// assert_eq!(response.body.greeting, "Hello, World!");
/// assert_eq!(response.body.timestamp, "req-1");
/// ```
pub fn greet(input: &GreetingInput, request_id: &str) -> StepResponse<GreetingBody> {
    let name = present(input.name.as_deref()).unwrap_or(DEFAULT_NAME);
    let message = present(input.message.as_deref()).unwrap_or(DEFAULT_MESSAGE);

    StepResponse::ok(GreetingBody {
        greeting: format!("{message}, {name}!"),
        timestamp: request_id.to_string(),
        step: STEP_NAME.to_string(),
        processed: true,
    })
}

/// 挨拶ステップのハンドラー
#[derive(Debug, Clone, Copy, Default)]
pub struct GreetingStep;

#[async_trait]
impl StepHandler for GreetingStep {
    fn name(&self) -> &'static str {
        STEP_NAME
    }

    async fn invoke(&self, event: Value, ctx: &InvocationContext) -> Result<Value, InvocationError> {
        tracing::debug!(step = STEP_NAME, request_id = %ctx.request_id, %event, "イベントを受信しました");

        let response = greet(&GreetingInput::from_event(&event), &ctx.request_id);

        tracing::debug!(step = STEP_NAME, greeting = %response.body.greeting, "レスポンスを返します");
        response.into_value()
    }
}
