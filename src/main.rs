//! `hello-workflow` コマンド
//!
//! ステップ関数の単体呼び出しと、ワークフロー全体のローカル実行を行います。
//!
//! ```text
//! hello-workflow invoke hello-world --payload '{"name":"Alice"}'
//! hello-workflow run --name Alice --message Hi
//! hello-workflow --workflow workflows/hello-world.toml definition
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use thiserror::Error;

use hello_workflow::config::workflow::Workflow;
use hello_workflow::engine::{
    ExecutionError, ExecutionStatus, LocalOrchestrator, Orchestrator, PollConfig, WorkflowExecutor,
    wait_for_completion,
};
use hello_workflow::error::{ConfigError, InvocationError};
use hello_workflow::handler::{InvocationContext, create_handler, function_name};
use hello_workflow::telemetry::{LogFormat, TelemetryError, init_tracing};

/// Hello World ワークフローのローカル実行ツール
#[derive(Debug, Parser)]
#[command(name = "hello-workflow", version, about, long_about = None)]
struct Cli {
    /// ワークフロー定義ファイル（省略時は組み込み定義）
    #[arg(long, global = true, env = "HELLO_WORKFLOW_FILE")]
    workflow: Option<PathBuf>,

    /// ログの出力形式
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "HELLO_WORKFLOW_LOG_FORMAT")]
    log_format: LogFormat,

    /// ログの出力先ファイル（省略時は標準エラー出力）
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// ステップ関数を 1 回呼び出す
    Invoke {
        /// ステップ名（hello-world / process-data / notify-completion）
        step: String,

        /// 入力 JSON
        #[arg(long, default_value = "{}")]
        payload: String,

        /// リクエスト ID（省略時は自動生成）
        #[arg(long)]
        request_id: Option<String>,
    },

    /// ワークフローを実行し、終了まで待つ
    Run {
        /// 挨拶する相手
        #[arg(long)]
        name: Option<String>,

        /// 挨拶の言葉
        #[arg(long)]
        message: Option<String>,

        /// 入力 JSON（指定すると --name / --message より優先）
        #[arg(long, conflicts_with_all = ["name", "message"])]
        input: Option<String>,

        /// 実行名（省略時は自動生成）
        #[arg(long)]
        execution_name: Option<String>,

        /// ポーリング回数
        #[arg(long, default_value_t = 30)]
        poll_attempts: u32,

        /// ポーリング間隔（ミリ秒）
        #[arg(long, default_value_t = 2000)]
        poll_interval_ms: u64,
    },

    /// ステートマシン定義を JSON で出力する
    Definition,

    /// ワークフロー定義を検証する
    Validate,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("入力 JSON を解釈できませんでした: {0}")]
    Json(#[from] serde_json::Error),

    #[error("不明なステップです: {0}")]
    UnknownStep(String),

    #[error("実行 '{execution_id}' は {status} で終了しました")]
    Unsuccessful {
        execution_id: String,
        status: ExecutionStatus,
    },
}

fn load_workflow(path: Option<&PathBuf>) -> Result<Workflow, ConfigError> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "ワークフロー定義を読み込みます");
            Workflow::from_file(path)
        }
        None => Ok(Workflow::hello_world()),
    }
}

fn run_input(name: Option<String>, message: Option<String>, input: Option<String>) -> Result<Value, CliError> {
    if let Some(raw) = input {
        return Ok(serde_json::from_str(&raw)?);
    }

    let mut object = Map::new();
    if let Some(name) = name {
        object.insert("name".to_string(), Value::String(name));
    }
    if let Some(message) = message {
        object.insert("message".to_string(), Value::String(message));
    }
    Ok(Value::Object(object))
}

fn print_json(value: &impl serde::Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Invoke {
            step,
            payload,
            request_id,
        } => {
            let handler = create_handler(&step).ok_or_else(|| CliError::UnknownStep(step.clone()))?;
            let ctx = match request_id {
                Some(id) => InvocationContext::new(id, function_name(&step)),
                None => InvocationContext::generate(function_name(&step)),
            };
            let event: Value = serde_json::from_str(&payload)?;

            let output = handler.invoke(event, &ctx).await?;
            print_json(&output)
        }

        Commands::Run {
            name,
            message,
            input,
            execution_name,
            poll_attempts,
            poll_interval_ms,
        } => {
            let workflow = load_workflow(cli.workflow.as_ref())?;
            let input = run_input(name, message, input)?;
            let orchestrator = LocalOrchestrator::new(WorkflowExecutor::new(workflow));

            let handle = orchestrator
                .start_execution(execution_name.as_deref(), input)
                .await?;
            let poll = PollConfig::new(poll_attempts, Duration::from_millis(poll_interval_ms));
            let description = wait_for_completion(&orchestrator, &handle.execution_id, poll).await?;

            print_json(&description)?;
            if description.status != ExecutionStatus::Succeeded {
                return Err(CliError::Unsuccessful {
                    execution_id: description.execution_id,
                    status: description.status,
                });
            }
            Ok(())
        }

        Commands::Definition => {
            let workflow = load_workflow(cli.workflow.as_ref())?;
            print_json(&workflow.to_state_machine_json())
        }

        Commands::Validate => {
            let workflow = load_workflow(cli.workflow.as_ref())?;
            let executor = WorkflowExecutor::new(workflow);
            executor.check_resources()?;

            println!(
                "OK: {} ({} ステート)",
                executor.workflow().name(),
                executor.workflow().states().len()
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_tracing(cli.log_format, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("エラー: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "コマンドが失敗しました");
            eprintln!("エラー: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from(["hello-workflow", "run", "--name", "Alice", "--message", "Hi"]).unwrap();

        match cli.command {
            Commands::Run { name, message, .. } => {
                assert_eq!(name.as_deref(), Some("Alice"));
                assert_eq!(message.as_deref(), Some("Hi"));
            }
            other => panic!("想定外のコマンド: {other:?}"),
        }
    }

    #[test]
    fn test_input_conflicts_with_name() {
        let result = Cli::try_parse_from(["hello-workflow", "run", "--input", "{}", "--name", "Alice"]);

        assert!(result.is_err());
    }

    #[test]
    fn test_run_input_from_flags() {
        let input = run_input(Some("Alice".to_string()), None, None).unwrap();
        assert_eq!(input, json!({ "name": "Alice" }));

        let input = run_input(None, None, Some(r#"{"name": 1}"#.to_string())).unwrap();
        assert_eq!(input, json!({ "name": 1 }));

        assert!(run_input(None, None, Some("not json".to_string())).is_err());
    }
}
