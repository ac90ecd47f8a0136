//! リトライポリシーとキャッチルール
//!
//! ステートごとに宣言される再試行・捕捉の設定を表します。
//! 再試行の実行自体はオーケストレーターの責務であり、ステップ実装は
//! この設定を意識しません。

use std::time::Duration;

/// すべてのエラーに一致するワイルドカード名
pub const ALL_ERRORS: &str = "States.ALL";

/// 一時的な実行環境障害として再試行対象にするエラー名
pub const TRANSIENT_LAMBDA_ERRORS: [&str; 3] = [
    "Lambda.ServiceException",
    "Lambda.AWSLambdaException",
    "Lambda.SdkClientException",
];

fn error_matches(error_equals: &[String], error_name: &str) -> bool {
    error_equals
        .iter()
        .any(|e| e == ALL_ERRORS || e == error_name)
}

/// リトライポリシー
///
/// `max_attempts` は初回実行を含まない再試行回数です。
/// n 回目の再試行前の待機時間は `interval * backoff_rate^(n-1)` です。
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    error_equals: Vec<String>,
    max_attempts: u32,
    interval: Duration,
    backoff_rate: f64,
}

impl RetryPolicy {
    /// 新しいリトライポリシーを生成
    pub fn new(
        error_equals: Vec<String>,
        max_attempts: u32,
        interval: Duration,
        backoff_rate: f64,
    ) -> Self {
        Self {
            error_equals,
            max_attempts,
            interval,
            backoff_rate,
        }
    }

    /// 一時的な実行環境障害を 2 秒間隔・倍率 2.0 で 3 回まで再試行するポリシー
    pub fn transient_lambda_errors() -> Self {
        Self::new(
            TRANSIENT_LAMBDA_ERRORS.iter().map(|e| e.to_string()).collect(),
            3,
            Duration::from_secs(2),
            2.0,
        )
    }

    pub fn error_equals(&self) -> &[String] {
        &self.error_equals
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn backoff_rate(&self) -> f64 {
        self.backoff_rate
    }

    /// エラー名がこのポリシーの対象かどうか
    pub fn matches(&self, error_name: &str) -> bool {
        error_matches(&self.error_equals, error_name)
    }

    /// `retry_no` 回目（1 始まり）の再試行前の待機時間
    ///
    /// 表現できない長さは [`Duration::MAX`] に丸めます。
    pub fn delay_for(&self, retry_no: u32) -> Duration {
        let exp = i32::try_from(retry_no.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.interval.as_secs_f64() * self.backoff_rate.powi(exp);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// キャッチルール
///
/// 再試行が尽きた、または再試行対象外のエラーを遷移先ステートへ送ります。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchRule {
    error_equals: Vec<String>,
    next: String,
}

impl CatchRule {
    pub fn new(error_equals: Vec<String>, next: impl Into<String>) -> Self {
        Self {
            error_equals,
            next: next.into(),
        }
    }

    /// すべてのエラーを `next` へ送るルール
    pub fn all(next: impl Into<String>) -> Self {
        Self::new(vec![ALL_ERRORS.to_string()], next)
    }

    pub fn error_equals(&self) -> &[String] {
        &self.error_equals
    }

    pub fn next(&self) -> &str {
        &self.next
    }

    pub fn matches(&self, error_name: &str) -> bool {
        error_matches(&self.error_equals, error_name)
    }
}
