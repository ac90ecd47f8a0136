//! ステップハンドラー層
//!
//! # 責務
//!
//! - 3 つのステップ関数（挨拶 / データ処理 / 完了通知）を統一的に扱う
//!   インターフェースを提供
//! - リソース名から適切なハンドラーを生成するファクトリー機能
//! - ワークフロー実行時に参照するハンドラーレジストリ
//!
//! 各ハンドラーは状態を持たない純粋な変換です。再試行やエラー時の遷移は
//! オーケストレーター（[`crate::engine`]）の責務で、ハンドラーは関与しません。
//!
//! # モジュール構成
//!
//! - `traits` - 共通インターフェース（[`StepHandler`]トレイト等）
//! - `greeting` - `hello-world` ステップ
//! - `processing` - `process-data` ステップ
//! - `completion` - `notify-completion` ステップ

pub mod traits;
pub mod greeting;
pub mod processing;
pub mod completion;

// 公開APIの再エクスポート
pub use traits::{InvocationContext, StepHandler, StepResponse};
pub use greeting::GreetingStep;
pub use processing::ProcessingStep;
pub use completion::CompletionStep;

use std::collections::HashMap;
use std::sync::Arc;

/// 組み込みステップのリソース名（実行順）
pub const BUILTIN_STEPS: [&str; 3] = [greeting::STEP_NAME, processing::STEP_NAME, completion::STEP_NAME];

/// リソース名からハンドラーを生成するファクトリー関数
///
/// 未知のリソース名には `None` を返します。
///
/// ```rust
/// use hello_workflow::handler::create_handler;
///
/// assert!(create_handler("process-data").is_some());
/// assert!(create_handler("unknown").is_none());
/// ```
pub fn create_handler(resource: &str) -> Option<Arc<dyn StepHandler>> {
    match resource {
        greeting::STEP_NAME => Some(Arc::new(GreetingStep)),
        processing::STEP_NAME => Some(Arc::new(ProcessingStep)),
        completion::STEP_NAME => Some(Arc::new(CompletionStep)),
        _ => None,
    }
}

/// 関数名の慣例（`{step}-function`）
pub fn function_name(resource: &str) -> String {
    format!("{resource}-function")
}

/// リソース名とハンドラーの対応表
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    /// 空のレジストリ
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// ハンドラーを登録（同名は上書き）
    pub fn register(&mut self, resource: impl Into<String>, handler: Arc<dyn StepHandler>) {
        self.handlers.insert(resource.into(), handler);
    }

    pub fn with(mut self, resource: impl Into<String>, handler: Arc<dyn StepHandler>) -> Self {
        self.register(resource, handler);
        self
    }

    pub fn get(&self, resource: &str) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(resource).cloned()
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.handlers.contains_key(resource)
    }
}

impl Default for HandlerRegistry {
    /// 組み込みの 3 ステップを登録したレジストリ
    fn default() -> Self {
        BUILTIN_STEPS
            .iter()
            .filter_map(|name| create_handler(name).map(|h| (*name, h)))
            .fold(Self::empty(), |registry, (name, handler)| registry.with(name, handler))
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry").field("handlers", &names).finish()
    }
}
