//! ワークフロー定義の設定レイヤー
//!
//! # モジュール構成
//!
//! - `dto` - TOML デシリアライズ用の DTO（内部専用）
//! - [`workflow`][]: ワークフロー全体の定義とステートマシン定義の生成
//! - [`step`][]: 各ステートの定義
//! - [`retry`][]: リトライポリシーとキャッチルール

mod dto;
pub mod retry;
pub mod step;
pub mod workflow;

pub use retry::{CatchRule, RetryPolicy};
pub use step::{StateKind, Transition, WorkflowState};
pub use workflow::Workflow;
