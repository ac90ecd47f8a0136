//! ワークフローステートの定義
//!
//! # 責務
//!
//! Workflowを構成するステートの定義体を提供するモジュール
//! アプリケーションに対して、[WorkflowState] を提供する。

use std::time::Duration;

use crate::error::ConfigError;
use super::dto::{CatchDto, RetryDto, WorkflowStateDto};
use super::retry::{CatchRule, RetryPolicy};

/// ステートの種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateKind {
    /// ステップ関数を 1 つ呼び出す
    Task {
        /// 呼び出すステップのリソース名（例: `hello-world`）
        resource: String,
        /// 呼び出しの制限時間（秒）
        timeout_secs: Option<u64>,
    },
    /// 入力をそのまま出力する
    Pass,
}

/// 次の遷移
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next(String),
    End,
}

/// ワークフローステート（ドメインモデル）
///
/// ワークフロー内の1つの処理単位を表します。
///
/// ## DTO との違い
///
/// - [`WorkflowStateDto`](super::dto::WorkflowStateDto): TOML デシリアライズ専用
/// - [`WorkflowState`]: バリデーション済み、ドメインロジックを持つ
#[derive(Debug, Clone)]
pub struct WorkflowState {
    name: String,
    kind: StateKind,
    transition: Transition,
    retry: Vec<RetryPolicy>,
    catch: Vec<CatchRule>,
}

impl WorkflowState {
    /// Task ステートを生成
    pub fn task(name: impl Into<String>, resource: impl Into<String>, transition: Transition) -> Self {
        Self {
            name: name.into(),
            kind: StateKind::Task {
                resource: resource.into(),
                timeout_secs: None,
            },
            transition,
            retry: Vec::new(),
            catch: Vec::new(),
        }
    }

    /// 終端の Pass ステートを生成
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StateKind::Pass,
            transition: Transition::End,
            retry: Vec::new(),
            catch: Vec::new(),
        }
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry.push(policy);
        self
    }

    pub fn with_catch(mut self, rule: CatchRule) -> Self {
        self.catch.push(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    /// Task ステートのリソース名
    pub fn resource(&self) -> Option<&str> {
        match &self.kind {
            StateKind::Task { resource, .. } => Some(resource),
            StateKind::Pass => None,
        }
    }

    /// Task ステートの制限時間
    pub fn timeout(&self) -> Option<Duration> {
        match &self.kind {
            StateKind::Task { timeout_secs, .. } => timeout_secs.map(Duration::from_secs),
            StateKind::Pass => None,
        }
    }

    pub fn transition(&self) -> &Transition {
        &self.transition
    }

    pub fn next(&self) -> Option<&str> {
        match &self.transition {
            Transition::Next(next) => Some(next),
            Transition::End => None,
        }
    }

    pub fn retry(&self) -> &[RetryPolicy] {
        &self.retry
    }

    pub fn catch(&self) -> &[CatchRule] {
        &self.catch
    }

    /// エラー名に一致する最初のリトライポリシー
    pub fn retry_policy_for(&self, error_name: &str) -> Option<&RetryPolicy> {
        self.retry.iter().find(|p| p.matches(error_name))
    }

    /// エラー名に一致する最初のキャッチルール
    pub fn catch_rule_for(&self, error_name: &str) -> Option<&CatchRule> {
        self.catch.iter().find(|c| c.matches(error_name))
    }
}

fn validate_error_equals(state: &str, error_equals: &[String]) -> Result<(), ConfigError> {
    if error_equals.is_empty() || error_equals.iter().any(|e| e.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "ステート '{state}' の error_equals が空です"
        )));
    }
    Ok(())
}

fn retry_from_dto(state: &str, dto: RetryDto) -> Result<RetryPolicy, ConfigError> {
    validate_error_equals(state, &dto.error_equals)?;
    if dto.interval_secs == 0 {
        return Err(ConfigError::Validation(format!(
            "ステート '{state}' の interval_secs は 1 以上である必要があります"
        )));
    }
    if !dto.backoff_rate.is_finite() || dto.backoff_rate < 1.0 {
        return Err(ConfigError::Validation(format!(
            "ステート '{state}' の backoff_rate は 1.0 以上である必要があります"
        )));
    }
    Ok(RetryPolicy::new(
        dto.error_equals,
        dto.max_attempts,
        Duration::from_secs(dto.interval_secs),
        dto.backoff_rate,
    ))
}

fn catch_from_dto(state: &str, dto: CatchDto) -> Result<CatchRule, ConfigError> {
    validate_error_equals(state, &dto.error_equals)?;
    Ok(CatchRule::new(dto.error_equals, dto.next))
}

/// DTO からドメインモデルへの変換（読み込み方向）
///
/// ステート単体で判定できる項目のみ検証します。遷移先の存在確認は
/// [`Workflow`](super::workflow::Workflow) 側で行います。
impl TryFrom<WorkflowStateDto> for WorkflowState {
    type Error = ConfigError;

    fn try_from(dto: WorkflowStateDto) -> Result<Self, Self::Error> {
        let name = dto.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::Validation("ステート名が空です".to_string()));
        }

        let kind = match dto.kind.as_str() {
            "task" => {
                let resource = dto
                    .resource
                    .filter(|r| !r.trim().is_empty())
                    .ok_or_else(|| {
                        ConfigError::Validation(format!("Task ステート '{name}' に resource がありません"))
                    })?;
                if dto.timeout_secs == Some(0) {
                    return Err(ConfigError::Validation(format!(
                        "ステート '{name}' の timeout_secs は 1 以上である必要があります"
                    )));
                }
                StateKind::Task {
                    resource,
                    timeout_secs: dto.timeout_secs,
                }
            }
            "pass" => {
                if dto.resource.is_some() || dto.timeout_secs.is_some() || !dto.retry.is_empty() || !dto.catch.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "Pass ステート '{name}' には resource / timeout_secs / retry / catch を指定できません"
                    )));
                }
                StateKind::Pass
            }
            other => {
                return Err(ConfigError::Validation(format!(
                    "ステート '{name}' の kind '{other}' は不明です（task または pass）"
                )));
            }
        };

        let transition = match (dto.next, dto.end.unwrap_or(false)) {
            (Some(next), false) => Transition::Next(next),
            (None, true) => Transition::End,
            (Some(_), true) => {
                return Err(ConfigError::Validation(format!(
                    "ステート '{name}' に next と end を同時に指定できません"
                )));
            }
            (None, false) => {
                return Err(ConfigError::Validation(format!(
                    "ステート '{name}' には next または end = true が必要です"
                )));
            }
        };

        let retry = dto
            .retry
            .into_iter()
            .map(|r| retry_from_dto(&name, r))
            .collect::<Result<Vec<_>, _>>()?;
        let catch = dto
            .catch
            .into_iter()
            .map(|c| catch_from_dto(&name, c))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            kind,
            transition,
            retry,
            catch,
        })
    }
}

/// ドメインモデルから DTO への変換（書き込み方向）
///
/// バリデーション済みのドメインモデルから DTO を生成するため、
/// この変換は失敗しません（`From` トレイトを使用）。
impl From<WorkflowState> for WorkflowStateDto {
    fn from(state: WorkflowState) -> Self {
        let (kind, resource, timeout_secs) = match state.kind {
            StateKind::Task { resource, timeout_secs } => ("task", Some(resource), timeout_secs),
            StateKind::Pass => ("pass", None, None),
        };
        let (next, end) = match state.transition {
            Transition::Next(next) => (Some(next), None),
            Transition::End => (None, Some(true)),
        };

        Self {
            name: state.name,
            kind: kind.to_string(),
            resource,
            next,
            end,
            timeout_secs,
            retry: state
                .retry
                .into_iter()
                .map(|p| RetryDto {
                    error_equals: p.error_equals().to_vec(),
                    max_attempts: p.max_attempts(),
                    interval_secs: p.interval().as_secs(),
                    backoff_rate: p.backoff_rate(),
                })
                .collect(),
            catch: state
                .catch
                .into_iter()
                .map(|c| CatchDto {
                    error_equals: c.error_equals().to_vec(),
                    next: c.next().to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_dto() -> WorkflowStateDto {
        WorkflowStateDto {
            name: "HelloWorld".to_string(),
            kind: "task".to_string(),
            resource: Some("hello-world".to_string()),
            next: Some("ProcessData".to_string()),
            end: None,
            timeout_secs: None,
            retry: vec![],
            catch: vec![],
        }
    }

    #[test]
    fn test_task_state_from_dto() {
        let state = WorkflowState::try_from(task_dto()).unwrap();

        assert_eq!(state.name(), "HelloWorld");
        assert_eq!(state.resource(), Some("hello-world"));
        assert_eq!(state.next(), Some("ProcessData"));
    }

    #[test]
    fn test_task_without_resource_is_rejected() {
        let mut dto = task_dto();
        dto.resource = None;

        let err = WorkflowState::try_from(dto).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_next_and_end_are_exclusive() {
        let mut dto = task_dto();
        dto.end = Some(true);

        assert!(WorkflowState::try_from(dto).is_err());
    }

    #[test]
    fn test_backoff_rate_below_one_is_rejected() {
        let mut dto = task_dto();
        dto.retry.push(RetryDto {
            error_equals: vec!["Lambda.ServiceException".to_string()],
            max_attempts: 3,
            interval_secs: 2,
            backoff_rate: 0.5,
        });

        assert!(WorkflowState::try_from(dto).is_err());
    }

    #[test]
    fn test_pass_state_with_retry_is_rejected() {
        let dto = WorkflowStateDto {
            name: "HandleError".to_string(),
            kind: "pass".to_string(),
            resource: None,
            next: None,
            end: Some(true),
            timeout_secs: None,
            retry: vec![RetryDto {
                error_equals: vec!["States.ALL".to_string()],
                max_attempts: 1,
                interval_secs: 1,
                backoff_rate: 1.0,
            }],
            catch: vec![],
        };

        assert!(WorkflowState::try_from(dto).is_err());
    }

    #[test]
    fn test_policy_lookup_by_error_name() {
        let state = WorkflowState::task("HelloWorld", "hello-world", Transition::End)
            .with_retry(RetryPolicy::transient_lambda_errors())
            .with_catch(CatchRule::all("HandleError"));

        assert!(state.retry_policy_for("Lambda.ServiceException").is_some());
        assert!(state.retry_policy_for("States.Timeout").is_none());
        assert_eq!(
            state.catch_rule_for("States.Timeout").map(|c| c.next()),
            Some("HandleError")
        );
    }
}
