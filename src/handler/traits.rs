//! ステップハンドラーの共通インターフェース定義
//!
//! # 責務
//!
//! - ステップ関数の共通トレイト [`StepHandler`] を定義
//! - 呼び出しごとの情報 [`InvocationContext`] を提供
//! - 全ステップ共通のレスポンス形 [`StepResponse`]（`{statusCode, body}`）を定義
//!
//! # 使用例
//!
//! ```rust,no_run
//! use hello_workflow::handler::{GreetingStep, InvocationContext, StepHandler};
//! use serde_json::json;
//!
//! async fn example() {
//!     let ctx = InvocationContext::new("request-1", "hello-world-function");
//!     let output = GreetingStep
//!         .invoke(json!({ "name": "Alice", "message": "Hi" }), &ctx)
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(output["body"]["greeting"], "Hi, Alice!");
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::InvocationError;

/// 成功時のステータスコード
pub const STATUS_OK: u16 = 200;

/// 呼び出しコンテキスト
///
/// 実行環境が呼び出しごとに払い出す情報です。`request_id` は不透明な識別子で、
/// ステップ出力の `timestamp` としてそのまま引き継がれます（時刻ではありません）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    /// 呼び出しのリクエスト ID
    pub request_id: String,
    /// 呼び出された関数名
    pub function_name: String,
}

impl InvocationContext {
    pub fn new(request_id: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            function_name: function_name.into(),
        }
    }

    /// ランダムなリクエスト ID でコンテキストを生成
    pub fn generate(function_name: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), function_name)
    }
}

/// ステップ関数の共通インターフェース
///
/// # 実装要件
///
/// - `Send + Sync`: 複数の実行から同時に呼び出される
/// - 入力の欠損・型違いでエラーを返さない（既定値に置き換える）
/// - 外部状態に触れないため、何度呼び出しても安全
///
/// `Err` はインフラ障害のみを表し、オーケストレーターの再試行対象になります。
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// ステップ名（例: `hello-world`）
    fn name(&self) -> &'static str;

    /// イベントを変換して次のステップへの出力を返す
    async fn invoke(&self, event: Value, ctx: &InvocationContext) -> Result<Value, InvocationError>;
}

/// ステップ関数のレスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResponse<B> {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: B,
}

impl<B> StepResponse<B> {
    pub fn ok(body: B) -> Self {
        Self {
            status_code: STATUS_OK,
            body,
        }
    }
}

impl<B: Serialize> StepResponse<B> {
    /// JSON 値に変換
    pub fn into_value(self) -> Result<Value, InvocationError> {
        serde_json::to_value(self).map_err(|e| InvocationError::TaskFailed(e.to_string()))
    }
}

/// オブジェクトから文字列フィールドを取り出す。文字列以外は欠損扱い
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// 前ステップの出力から `body` を取り出す
pub(crate) fn body_of(event: &Value) -> Option<&Value> {
    event.get("body").filter(|b| b.is_object())
}
