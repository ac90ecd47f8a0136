//! Workflow 定義の読み込みと管理を行うモジュール
//!
//! # 責務
//!
//! このモジュールは、ステート遷移として表されたワークフローを TOML 形式で定義し、
//! それを Rust の型として扱うための機能を提供します。
//!
//! ## 主な機能
//!
//! - **TOML パース**: `workflows/` ディレクトリ内の TOML ファイルを読み込み、
//!   [`Workflow`] 構造体にデシリアライズ
//! - **バリデーション**: 遷移先の存在、終端への到達、リトライ設定の妥当性を検証
//! - **ステートマシン定義の生成**: オーケストレーターに登録する JSON 形式の
//!   ステートマシン定義（[`Workflow::to_state_machine_json`]）を出力
//!
//! ## 使用例
//!
//! ```toml
//! [workflow]
//! name = "hello-world-workflow"
//! start_at = "HelloWorld"
//!
//! [[states]]
//! name = "HelloWorld"
//! kind = "task"
//! resource = "hello-world"
//! end = true
//! ```
//!
//! ## 関連モジュール
//!
//! - [`crate::config::step`]: 各ステートの定義
//! - [`crate::engine::executor`]: ローカル実行エンジン

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde_json::{Map, Value, json};

use crate::error::ConfigError;
use super::dto::{WorkflowDto, WorkflowMetadataDto};
use super::retry::{CatchRule, RetryPolicy};
use super::step::{StateKind, Transition, WorkflowState};

/// 既定のワークフロー名
pub const DEFAULT_WORKFLOW_NAME: &str = "hello-world-workflow";

/// エラー処理用の終端ステート名
pub const HANDLE_ERROR_STATE: &str = "HandleError";

/// ワークフロー定義（ドメインモデル）
///
/// バリデーション済みの状態を保証します。
///
/// ## DTO との違い
///
/// - [`WorkflowDto`]: TOML デシリアライズ専用、バリデーション前の生データ
/// - [`Workflow`]: バリデーション済み、ドメインロジックを持つ
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    comment: Option<String>,
    version: Option<String>,
    start_at: String,
    states: Vec<WorkflowState>,
}

impl Workflow {
    /// 組み込みの 3 ステップワークフロー
    ///
    /// `HelloWorld → ProcessData → NotifyCompletion` の各 Task に
    /// 一時障害向けのリトライと `HandleError` へのキャッチを設定します。
    pub fn hello_world() -> Self {
        let task = |name: &str, resource: &str, transition: Transition| {
            WorkflowState::task(name, resource, transition)
                .with_retry(RetryPolicy::transient_lambda_errors())
                .with_catch(CatchRule::all(HANDLE_ERROR_STATE))
        };

        Self {
            name: DEFAULT_WORKFLOW_NAME.to_string(),
            comment: Some("Hello World ステップ関数ワークフロー".to_string()),
            version: Some("1.0".to_string()),
            start_at: "HelloWorld".to_string(),
            states: vec![
                task("HelloWorld", "hello-world", Transition::Next("ProcessData".to_string())),
                task("ProcessData", "process-data", Transition::Next("NotifyCompletion".to_string())),
                task("NotifyCompletion", "notify-completion", Transition::End),
                WorkflowState::pass(HANDLE_ERROR_STATE),
            ],
        }
    }

    /// TOML ファイルからワークフローを読み込む
    ///
    /// # 処理フロー
    ///
    /// 1. ファイル読み込み
    /// 2. TOML デシリアライズ → [`WorkflowDto`]
    /// 3. バリデーション & 変換 → [`Workflow`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// TOML 文字列からワークフローを読み込む
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let dto: WorkflowDto = toml::from_str(toml)?;
        Self::try_from(dto)
    }

    /// ワークフローを TOML 文字列に変換
    pub fn to_string(&self) -> Result<String, ConfigError> {
        let dto = WorkflowDto::from(self.clone());
        Ok(toml::to_string(&dto)?)
    }

    /// ワークフローを TOML ファイルに保存
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = self.to_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn start_at(&self) -> &str {
        &self.start_at
    }

    pub fn states(&self) -> &[WorkflowState] {
        &self.states
    }

    /// 名前でステートを検索
    pub fn state(&self, name: &str) -> Option<&WorkflowState> {
        self.states.iter().find(|s| s.name() == name)
    }

    /// Task ステートのリソース名一覧（定義順）
    pub fn resources(&self) -> Vec<&str> {
        self.states.iter().filter_map(|s| s.resource()).collect()
    }

    /// オーケストレーター向けの JSON ステートマシン定義を生成
    ///
    /// ```rust
    /// use hello_workflow::config::workflow::Workflow;
    ///
    /// let definition = Workflow::hello_world().to_state_machine_json();
    /// assert_eq!(definition["StartAt"], "HelloWorld");
    /// assert_eq!(definition["States"]["HandleError"]["Type"], "Pass");
    /// ```
    pub fn to_state_machine_json(&self) -> Value {
        let mut states = Map::new();
        for state in &self.states {
            states.insert(state.name().to_string(), render_state(state));
        }

        let mut definition = Map::new();
        if let Some(comment) = &self.comment {
            definition.insert("Comment".to_string(), json!(comment));
        }
        definition.insert("StartAt".to_string(), json!(self.start_at));
        definition.insert("States".to_string(), Value::Object(states));
        Value::Object(definition)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation("ワークフロー名が空です".to_string()));
        }
        if self.states.is_empty() {
            return Err(ConfigError::Validation("ステートが 1 つもありません".to_string()));
        }

        let mut names = HashSet::new();
        for state in &self.states {
            if !names.insert(state.name()) {
                return Err(ConfigError::Validation(format!(
                    "ステート名 '{}' が重複しています",
                    state.name()
                )));
            }
        }

        if !names.contains(self.start_at.as_str()) {
            return Err(ConfigError::Validation(format!(
                "start_at '{}' に対応するステートがありません",
                self.start_at
            )));
        }

        for state in &self.states {
            let targets = state
                .next()
                .into_iter()
                .chain(state.catch().iter().map(|c| c.next()));
            for target in targets {
                if !names.contains(target) {
                    return Err(ConfigError::Validation(format!(
                        "ステート '{}' の遷移先 '{}' が存在しません",
                        state.name(),
                        target
                    )));
                }
            }
        }

        // next と catch の遷移をたどり、循環がないこと
        let mut marks = HashMap::new();
        if let Some(name) = self.find_cycle(self.start_at.as_str(), &mut marks) {
            return Err(ConfigError::Validation(format!(
                "ステート '{name}' で遷移が循環しています"
            )));
        }

        Ok(())
    }
}

/// 循環検出の探索状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

impl Workflow {
    /// 深さ優先で遷移をたどり、探索中のステートに戻ったらその名前を返す
    fn find_cycle<'a>(&'a self, name: &'a str, marks: &mut HashMap<&'a str, Visit>) -> Option<&'a str> {
        match marks.get(name) {
            Some(Visit::InProgress) => return Some(name),
            Some(Visit::Done) => return None,
            None => {}
        }
        marks.insert(name, Visit::InProgress);

        if let Some(state) = self.state(name) {
            let targets = state
                .next()
                .into_iter()
                .chain(state.catch().iter().map(|c| c.next()));
            for target in targets {
                if let Some(cycle) = self.find_cycle(target, marks) {
                    return Some(cycle);
                }
            }
        }

        marks.insert(name, Visit::Done);
        None
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::hello_world()
    }
}

fn render_state(state: &WorkflowState) -> Value {
    let mut out = Map::new();
    match state.kind() {
        StateKind::Task { resource, timeout_secs } => {
            out.insert("Type".to_string(), json!("Task"));
            out.insert("Resource".to_string(), json!(resource));
            if let Some(secs) = timeout_secs {
                out.insert("TimeoutSeconds".to_string(), json!(secs));
            }
        }
        StateKind::Pass => {
            out.insert("Type".to_string(), json!("Pass"));
        }
    }

    match state.transition() {
        Transition::Next(next) => out.insert("Next".to_string(), json!(next)),
        Transition::End => out.insert("End".to_string(), json!(true)),
    };

    if !state.retry().is_empty() {
        let retry: Vec<Value> = state
            .retry()
            .iter()
            .map(|p| {
                json!({
                    "ErrorEquals": p.error_equals(),
                    "IntervalSeconds": p.interval().as_secs(),
                    "MaxAttempts": p.max_attempts(),
                    "BackoffRate": p.backoff_rate(),
                })
            })
            .collect();
        out.insert("Retry".to_string(), Value::Array(retry));
    }

    if !state.catch().is_empty() {
        let catch: Vec<Value> = state
            .catch()
            .iter()
            .map(|c| json!({ "ErrorEquals": c.error_equals(), "Next": c.next() }))
            .collect();
        out.insert("Catch".to_string(), Value::Array(catch));
    }

    Value::Object(out)
}

/// DTO からドメインモデルへの変換（読み込み方向）
///
/// バリデーションを実施し、不正なデータの場合は [`ConfigError::Validation`] を返します。
///
/// # 処理フロー
///
/// 1. 各ステートの変換（`WorkflowStateDto` → `WorkflowState`）
/// 2. 遷移先・終端到達のバリデーション
/// 3. `Workflow` の構築
impl TryFrom<WorkflowDto> for Workflow {
    type Error = ConfigError;

    fn try_from(dto: WorkflowDto) -> Result<Self, Self::Error> {
        let states = dto
            .states
            .into_iter()
            .map(WorkflowState::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let workflow = Self {
            name: dto.workflow.name,
            comment: dto.workflow.comment,
            version: dto.workflow.version,
            start_at: dto.workflow.start_at,
            states,
        };
        workflow.validate()?;
        Ok(workflow)
    }
}

/// ドメインモデルから DTO への変換（書き込み方向）
impl From<Workflow> for WorkflowDto {
    fn from(workflow: Workflow) -> Self {
        Self {
            workflow: WorkflowMetadataDto {
                name: workflow.name,
                comment: workflow.comment,
                version: workflow.version,
                start_at: workflow.start_at,
            },
            states: workflow.states.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_STATES: &str = r#"
[workflow]
name = "two-states"
start_at = "First"

[[states]]
name = "First"
kind = "task"
resource = "hello-world"
next = "Second"

[[states.retry]]
error_equals = ["Lambda.ServiceException"]
max_attempts = 2
interval_secs = 1
backoff_rate = 1.5

[[states.catch]]
error_equals = ["States.ALL"]
next = "Failed"

[[states]]
name = "Second"
kind = "task"
resource = "notify-completion"
timeout_secs = 10
end = true

[[states]]
name = "Failed"
kind = "pass"
end = true
"#;

    #[test]
    fn test_from_toml() {
        let workflow = Workflow::from_toml(TWO_STATES).unwrap();

        assert_eq!(workflow.name(), "two-states");
        assert_eq!(workflow.start_at(), "First");
        assert_eq!(workflow.states().len(), 3);
        assert_eq!(workflow.resources(), vec!["hello-world", "notify-completion"]);

        let first = workflow.state("First").unwrap();
        assert_eq!(first.retry()[0].max_attempts(), 2);
        assert_eq!(first.catch()[0].next(), "Failed");
        assert_eq!(
            workflow.state("Second").unwrap().timeout(),
            Some(std::time::Duration::from_secs(10))
        );
    }

    #[test]
    fn test_unknown_start_at_is_rejected() {
        let toml = TWO_STATES.replace("start_at = \"First\"", "start_at = \"Missing\"");

        let err = Workflow::from_toml(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_unknown_catch_target_is_rejected() {
        let toml = TWO_STATES.replace("next = \"Failed\"", "next = \"Nowhere\"");

        assert!(matches!(
            Workflow::from_toml(&toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_state_names_are_rejected() {
        let toml = TWO_STATES.replace("name = \"Second\"", "name = \"First\"");

        assert!(Workflow::from_toml(&toml).is_err());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let toml = r#"
[workflow]
name = "loop"
start_at = "A"

[[states]]
name = "A"
kind = "task"
resource = "hello-world"
next = "B"

[[states]]
name = "B"
kind = "task"
resource = "process-data"
next = "A"
"#;

        let err = Workflow::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("循環"));
    }

    #[test]
    fn test_catch_back_to_itself_is_rejected() {
        let toml = r#"
[workflow]
name = "self-catch"
start_at = "A"

[[states]]
name = "A"
kind = "task"
resource = "hello-world"
end = true

[[states.catch]]
error_equals = ["States.ALL"]
next = "A"
"#;

        let err = Workflow::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("'A'")));
    }

    #[test]
    fn test_cycle_behind_catch_target_is_rejected() {
        let toml = r#"
[workflow]
name = "cycle-behind-catch"
start_at = "A"

[[states]]
name = "A"
kind = "task"
resource = "hello-world"
end = true

[[states.catch]]
error_equals = ["States.ALL"]
next = "B"

[[states]]
name = "B"
kind = "pass"
next = "C"

[[states]]
name = "C"
kind = "pass"
next = "B"
"#;

        let err = Workflow::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("循環")));
    }

    #[test]
    fn test_shared_catch_target_is_not_a_cycle() {
        // 複数の Task が同じエラー処理ステートへ遷移するのは循環ではない
        let toml = r#"
[workflow]
name = "shared-catch"
start_at = "A"

[[states]]
name = "A"
kind = "task"
resource = "hello-world"
next = "B"

[[states.catch]]
error_equals = ["States.ALL"]
next = "Failed"

[[states]]
name = "B"
kind = "task"
resource = "process-data"
end = true

[[states.catch]]
error_equals = ["States.ALL"]
next = "Failed"

[[states]]
name = "Failed"
kind = "pass"
end = true
"#;

        assert!(Workflow::from_toml(toml).is_ok());
        assert!(Workflow::from_toml(&Workflow::hello_world().to_string().unwrap()).is_ok());
    }

    #[test]
    fn test_invalid_toml_is_deserialize_error() {
        assert!(matches!(
            Workflow::from_toml("[workflow"),
            Err(ConfigError::TomlDeserialize(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip_keeps_policies() {
        let original = Workflow::hello_world();
        let restored = Workflow::from_toml(&original.to_string().unwrap()).unwrap();

        assert_eq!(restored.name(), original.name());
        assert_eq!(restored.states().len(), 4);
        assert_eq!(
            restored.state("ProcessData").unwrap().retry(),
            original.state("ProcessData").unwrap().retry()
        );
    }

    #[test]
    fn test_state_machine_json_shape() {
        let definition = Workflow::hello_world().to_state_machine_json();
        let states = &definition["States"];

        assert_eq!(states["HelloWorld"]["Type"], "Task");
        assert_eq!(states["HelloWorld"]["Next"], "ProcessData");
        assert_eq!(states["NotifyCompletion"]["End"], true);
        assert_eq!(states["HandleError"]["Type"], "Pass");

        let retry = &states["ProcessData"]["Retry"][0];
        assert_eq!(retry["MaxAttempts"], 3);
        assert_eq!(retry["IntervalSeconds"], 2);
        assert_eq!(retry["BackoffRate"], 2.0);
        assert_eq!(retry["ErrorEquals"][0], "Lambda.ServiceException");
        assert_eq!(states["NotifyCompletion"]["Catch"][0]["Next"], "HandleError");
    }
}
