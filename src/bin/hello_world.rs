//! 挨拶ステップの関数エントリーポイント

use hello_workflow::handler::GreetingStep;
use hello_workflow::telemetry::{LogFormat, init_tracing};

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    let _guard = init_tracing(LogFormat::Json, None)?;

    hello_workflow::lambda::serve(GreetingStep).await
}
