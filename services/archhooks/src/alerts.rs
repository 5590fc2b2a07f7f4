//! Native alert dialogs
//!
//! The presenter shows the dialog; `Alerts` owns the "don't show again"
//! list and maps buttons onto results.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

/// Icon/severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Note,
    Stop,
}

/// Button the user dismissed the alert with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertButton {
    Ok,
    Cancel,
    /// Any other answer (dialog closed by the window manager, etc.)
    Other(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum MessageBoxResult {
    Retry,
    Ignore,
}

/// Something that can put an alert in front of the user.
pub trait AlertPresenter: Send + Sync {
    fn show(
        &self,
        kind: AlertKind,
        message: &str,
        ok_label: &str,
        cancel_label: Option<&str>,
    ) -> AlertButton;
}

/// Headless presenter: writes the alert to the log and answers OK.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl AlertPresenter for LogPresenter {
    fn show(
        &self,
        kind: AlertKind,
        message: &str,
        _ok_label: &str,
        _cancel_label: Option<&str>,
    ) -> AlertButton {
        match kind {
            AlertKind::Note => log::info!("ALERT: {}", message),
            AlertKind::Stop => log::error!("ALERT: {}", message),
        }
        AlertButton::Ok
    }
}

/// Message IDs the user chose not to see again.
///
/// Serializes as a plain sorted array of strings so the embedding app can
/// persist it between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct IgnoreList {
    ids: BTreeSet<String>,
}

impl IgnoreList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `id` was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoreList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for IgnoreList {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.ids.extend(iter.into_iter().map(Into::into));
    }
}

pub struct Alerts {
    presenter: Box<dyn AlertPresenter>,
    ignored: Mutex<IgnoreList>,
}

impl Alerts {
    pub fn new(presenter: Box<dyn AlertPresenter>) -> Self {
        Self {
            presenter,
            ignored: Mutex::new(IgnoreList::new()),
        }
    }

    pub fn with_ignored(self, ids: impl IntoIterator<Item = String>) -> Self {
        self.ignored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(ids);
        self
    }

    /// Informational box with a "Don't show again" button.
    ///
    /// An empty `id` can't be silenced.
    pub fn message_box_ok(&self, message: &str, id: &str) {
        let allow_hush = !id.is_empty();
        if allow_hush && self.is_message_ignored(id) {
            log::debug!("Suppressed ignored message '{}'", id);
            return;
        }

        let button =
            self.presenter
                .show(AlertKind::Note, message, "OK", Some("Don't show again"));
        if button == AlertButton::Cancel && allow_hush {
            self.ignore_message(id);
        }
    }

    /// Error box. Errors are never suppressed.
    pub fn message_box_error(&self, message: &str, _id: &str) {
        self.presenter.show(AlertKind::Stop, message, "OK", None);
    }

    pub fn message_box_abort_retry_ignore(&self, message: &str, _id: &str) -> MessageBoxResult {
        match self
            .presenter
            .show(AlertKind::Note, message, "Retry", Some("Ignore"))
        {
            AlertButton::Ok => MessageBoxResult::Retry,
            AlertButton::Cancel => MessageBoxResult::Ignore,
            AlertButton::Other(code) => {
                log::error!("Unexpected alert button {} for '{}'", code, message);
                MessageBoxResult::Ignore
            }
        }
    }

    pub fn ignore_message(&self, id: &str) {
        log::info!("Message '{}' will no longer be shown", id);
        self.ignored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
    }

    pub fn is_message_ignored(&self, id: &str) -> bool {
        self.ignored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    pub fn ignored_ids(&self) -> Vec<String> {
        self.ignored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(str::to_string)
            .collect()
    }

    /// Snapshot to persist so the IDs stay silenced next run.
    pub fn ignore_list(&self) -> IgnoreList {
        self.ignored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for Alerts {
    fn default() -> Self {
        Self::new(Box::new(LogPresenter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    type Shown = Arc<Mutex<Vec<(AlertKind, String, Option<String>)>>>;

    /// Answers with a fixed button and remembers what it was asked to show.
    struct ScriptedPresenter {
        answer: AlertButton,
        shown: Shown,
    }

    impl AlertPresenter for ScriptedPresenter {
        fn show(
            &self,
            kind: AlertKind,
            message: &str,
            _ok_label: &str,
            cancel_label: Option<&str>,
        ) -> AlertButton {
            self.shown.lock().unwrap().push((
                kind,
                message.to_string(),
                cancel_label.map(str::to_string),
            ));
            self.answer
        }
    }

    fn alerts(answer: AlertButton) -> (Alerts, Shown) {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let presenter = ScriptedPresenter {
            answer,
            shown: shown.clone(),
        };
        (Alerts::new(Box::new(presenter)), shown)
    }

    #[test]
    fn test_dont_show_again() {
        let (alerts, shown) = alerts(AlertButton::Cancel);

        alerts.message_box_ok("Sound driver is slow", "slow-driver");
        assert!(alerts.is_message_ignored("slow-driver"));

        alerts.message_box_ok("Sound driver is slow", "slow-driver");
        let shown = shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, AlertKind::Note);
        assert_eq!(shown[0].2.as_deref(), Some("Don't show again"));
    }

    #[test]
    fn test_empty_id_never_silenced() {
        let (alerts, shown) = alerts(AlertButton::Cancel);

        alerts.message_box_ok("hello", "");
        alerts.message_box_ok("hello", "");
        assert_eq!(shown.lock().unwrap().len(), 2);
        assert!(alerts.ignored_ids().is_empty());
    }

    #[test]
    fn test_ok_does_not_silence() {
        let (alerts, _shown) = alerts(AlertButton::Ok);
        alerts.message_box_ok("hello", "greeting");
        assert!(!alerts.is_message_ignored("greeting"));
    }

    #[test]
    fn test_errors_ignore_the_ignore_list() {
        let (alerts, shown) = alerts(AlertButton::Ok);
        let alerts = alerts.with_ignored(vec!["disk-full".to_string()]);

        alerts.message_box_error("Disk full", "disk-full");
        let shown = shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, AlertKind::Stop);
        assert_eq!(shown[0].2, None);
    }

    #[test]
    fn test_abort_retry_ignore_mapping() {
        let (retry, _) = alerts(AlertButton::Ok);
        assert_eq!(
            retry.message_box_abort_retry_ignore("Load failed", ""),
            MessageBoxResult::Retry
        );

        let (ignore, _) = alerts(AlertButton::Cancel);
        assert_eq!(
            ignore.message_box_abort_retry_ignore("Load failed", ""),
            MessageBoxResult::Ignore
        );

        let (odd, _) = alerts(AlertButton::Other(7));
        assert_eq!(
            odd.message_box_abort_retry_ignore("Load failed", ""),
            MessageBoxResult::Ignore
        );
    }

    #[test]
    fn test_log_presenter_answers_ok() {
        let alerts = Alerts::default();
        assert_eq!(
            alerts.message_box_abort_retry_ignore("anything", ""),
            MessageBoxResult::Retry
        );
    }

    #[test]
    fn test_ignore_list_persists_as_json() {
        let (first_run, _shown) = alerts(AlertButton::Cancel);
        first_run.message_box_ok("Sound driver is slow", "slow-driver");
        first_run.ignore_message("disk-nearly-full");

        let json = serde_json::to_string(&first_run.ignore_list()).unwrap();
        assert_eq!(json, r#"["disk-nearly-full","slow-driver"]"#);

        let restored: IgnoreList = serde_json::from_str(&json).unwrap();
        let (next_run, shown) = alerts(AlertButton::Ok);
        let next_run = next_run.with_ignored(restored.iter().map(str::to_string));
        next_run.message_box_ok("Sound driver is slow", "slow-driver");
        assert!(shown.lock().unwrap().is_empty());
        assert_eq!(next_run.ignore_list(), restored);
    }
}
