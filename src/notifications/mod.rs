use std::env;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

/// バックアップ実行結果の通知内容を保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSummary {
    pub source_name: String,
    pub outcome: Result<String, String>,
}

impl BackupSummary {
    /// 作成したバックアップ名から成功サマリを生成する。
    pub fn succeeded(source_name: impl Into<String>, backup_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            outcome: Ok(backup_name.into()),
        }
    }

    /// 失敗理由から失敗サマリを生成する。
    pub fn failed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            outcome: Err(reason.into()),
        }
    }

    /// 成功有無を返す。
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// 通知本文を組み立てる。
    pub fn message(&self) -> String {
        match &self.outcome {
            Ok(backup_name) => format!("{} -> {}", self.source_name, backup_name),
            Err(reason) => format!("{}: {}", self.source_name, reason),
        }
    }
}

/// 実行結果に応じた通知を発火する。
pub fn notify_backup_result(summary: &BackupSummary) {
    #[cfg(test)]
    if let Some(override_fn) = test_override() {
        let _ = override_fn(summary);
        return;
    }

    if is_test_mode_enabled() {
        return;
    }

    if let Err(e) = dispatch(summary) {
        log::warn!("{e}");
    }
}

/// テストモード時は実通知を抑止する。
fn is_test_mode_enabled() -> bool {
    matches!(env::var("FOLDERBAK_TEST_MODE").as_deref(), Ok("1"))
}

#[cfg(target_os = "macos")]
fn dispatch(summary: &BackupSummary) -> Result<(), String> {
    use mac_notification_sys::{Notification, send_notification};

    let subtitle = if summary.is_success() {
        "completed"
    } else {
        "failed"
    };

    let mut options = Notification::new();
    options.asynchronous(true);

    send_notification("folderbak", Some(subtitle), &summary.message(), Some(&options))
        .map(|_| ())
        .map_err(|e| format!("notification delivery failed: {e}"))
}

#[cfg(not(target_os = "macos"))]
fn dispatch(_summary: &BackupSummary) -> Result<(), String> {
    Ok(())
}

#[cfg(test)]
type TestNotifier = fn(&BackupSummary) -> Result<(), String>;

#[cfg(test)]
fn notifier_slot() -> &'static Mutex<Option<TestNotifier>> {
    static SLOT: OnceLock<Mutex<Option<TestNotifier>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

#[cfg(test)]
fn test_override() -> Option<TestNotifier> {
    notifier_slot().lock().ok().and_then(|guard| *guard)
}

#[cfg(test)]
pub(crate) fn with_test_notifier<T>(notifier: TestNotifier, f: impl FnOnce() -> T) -> T {
    *notifier_slot().lock().expect("lock notifier slot") = Some(notifier);
    let result = f();
    *notifier_slot().lock().expect("lock notifier slot") = None;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_message_names_backup_on_success() {
        let summary = BackupSummary::succeeded("project", "project_3");
        assert!(summary.is_success());
        assert_eq!(summary.message(), "project -> project_3");
    }

    #[test]
    fn summary_message_carries_reason_on_failure() {
        let summary = BackupSummary::failed("project", "File exists (os error 17)");
        assert!(!summary.is_success());
        assert_eq!(summary.message(), "project: File exists (os error 17)");
    }
}
