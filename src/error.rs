//! エラー型の定義
//!
//! このモジュールは、hello-workflow 全体で使用されるエラー型を定義します。
//!
//! - [`ConfigError`]: ワークフロー定義の読み込み・検証に関するエラー
//! - [`InvocationError`]: ステップ呼び出し時のインフラ障害
//!
//! ステップは入力の不備ではエラーを返しません。欠損値はすべて既定値に
//! 置き換えられるため、[`InvocationError`] は実行環境側の障害のみを表します。

use thiserror::Error;

/// 設定関連のエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// ファイルの読み込みに失敗
    #[error("設定ファイルの読み込みに失敗しました: {0}")]
    FileRead(#[from] std::io::Error),

    /// TOML のデシリアライズに失敗
    #[error("TOML のデシリアライズに失敗しました: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// TOML のシリアライズに失敗
    #[error("TOML のシリアライズに失敗しました: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// バリデーションエラー
    #[error("設定のバリデーションに失敗しました: {0}")]
    Validation(String),
}

/// ステップ呼び出し時のエラー
///
/// オーケストレーターが再試行・捕捉の判定に使うエラー名
/// （[`InvocationError::error_name`]）を持ちます。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationError {
    /// 実行サービス側の一時的な障害
    #[error("サービス例外: {0}")]
    ServiceException(String),

    /// 実行環境の内部エラー
    #[error("実行環境エラー: {0}")]
    LambdaException(String),

    /// クライアント側 SDK のエラー
    #[error("SDK クライアントエラー: {0}")]
    SdkClient(String),

    /// ステップが制限時間内に完了しなかった
    #[error("タイムアウト: {timeout_secs}秒以内に完了しませんでした")]
    Timeout {
        /// タイムアウト時間（秒）
        timeout_secs: u64,
    },

    /// その他のタスク失敗
    #[error("タスク失敗: {0}")]
    TaskFailed(String),
}

impl InvocationError {
    /// オーケストレーターのステート言語におけるエラー名
    pub fn error_name(&self) -> &'static str {
        match self {
            Self::ServiceException(_) => "Lambda.ServiceException",
            Self::LambdaException(_) => "Lambda.AWSLambdaException",
            Self::SdkClient(_) => "Lambda.SdkClientException",
            Self::Timeout { .. } => "States.Timeout",
            Self::TaskFailed(_) => "States.TaskFailed",
        }
    }
}
