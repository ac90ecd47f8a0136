//! 関数ランタイムへのアダプター（`lambda` フィーチャー）
//!
//! ランタイムのリクエスト ID を [`InvocationContext::request_id`] に渡し、
//! ペイロードをそのままハンドラーへ渡します。

use std::sync::Arc;

use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value;

use crate::handler::{InvocationContext, StepHandler, function_name};

/// ハンドラーを関数ランタイム上で待ち受ける
pub async fn serve<H>(handler: H) -> Result<(), Error>
where
    H: StepHandler + 'static,
{
    let handler = Arc::new(handler);

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = Arc::clone(&handler);
        async move {
            let (payload, context) = event.into_parts();
            let ctx = InvocationContext::new(context.request_id, function_name(handler.name()));
            handler.invoke(payload, &ctx).await.map_err(Error::from)
        }
    }))
    .await
}
