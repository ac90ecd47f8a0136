//! ログ出力の初期化
//!
//! `RUST_LOG` でフィルターを指定できます（未指定なら `info`）。出力先は
//! 標準エラー出力またはログファイルで、いずれも `tracing-appender` の
//! ノンブロッキングライター経由で書き込みます。
//!
//! ```rust,no_run
//! use hello_workflow::telemetry::{LogFormat, init_tracing};
//!
//! // ガードを破棄するとバッファが書き出されなくなるため、main の終わりまで保持する
//! let _guard = init_tracing(LogFormat::Json, None).unwrap();
//! tracing::info!("起動しました");
//! ```

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// 既定のログフィルター
pub const DEFAULT_LOG_FILTER: &str = "info";

/// ログの出力形式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// 人が読むためのテキスト形式
    #[default]
    Text,
    /// 1 行 1 イベントの JSON 形式
    Json,
}

/// ログ初期化エラー
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("ログファイル '{path}' を開けませんでした: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ログの初期化に失敗しました: {0}")]
    Init(#[from] TryInitError),
}

/// `RUST_LOG` からフィルターを作る（不正・未指定なら既定値）
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// グローバルなサブスクライバーを登録する
///
/// `log_file` を指定すると追記モードで開いて書き込みます。戻り値のガードが
/// 破棄されるとバッファが書き出されるので、呼び出し側で保持してください。
pub fn init_tracing(format: LogFormat, log_file: Option<&Path>) -> Result<WorkerGuard, TelemetryError> {
    let (writer, guard, ansi) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| TelemetryError::LogFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (writer, guard, false)
        }
        None => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
            (writer, guard, true)
        }
    };

    let registry = tracing_subscriber::registry().with(env_filter());
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_ansi(ansi).with_writer(writer))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false).with_writer(writer))
            .try_init()?,
    }

    Ok(guard)
}
