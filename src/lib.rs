//! Hello World ステップ関数ワークフロー
//!
//! 挨拶の生成 → データ処理 → 完了通知の 3 ステップを連鎖させるワークフローと、
//! それを手元で実行するためのエンジンを提供します。
//!
//! # モジュール構成
//!
//! - [`config`][]: ワークフロー定義（TOML）とステートマシン表現
//! - [`handler`][]: 3 つのステップ関数
//! - [`engine`][]: ローカル実行エンジンとオーケストレーター
//! - [`error`][]: 設定エラーと呼び出しエラー
//! - [`telemetry`][]: ログ出力の初期化

pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod telemetry;

#[cfg(feature = "lambda")]
pub mod lambda;
