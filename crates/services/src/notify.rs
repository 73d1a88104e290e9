//! User-facing notifications raised by the API client.

pub trait Notifier: Send + Sync {
    /// Show a transient error message to the user.
    fn error(&self, message: &str);

    /// Credentials are gone; the application must reset to its signed-out
    /// state.
    fn session_reset(&self);
}

/// Default notifier: routes everything to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn session_reset(&self) {
        tracing::warn!("session expired, credentials cleared");
    }
}

#[cfg(test)]
pub(crate) use recording::RecordingNotifier;

#[cfg(test)]
mod recording {
    use super::Notifier;
    use parking_lot::Mutex;

    /// Records notifications for later inspection.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingNotifier {
        errors: Mutex<Vec<String>>,
        resets: Mutex<usize>,
    }

    impl RecordingNotifier {
        pub(crate) fn errors(&self) -> Vec<String> {
            self.errors.lock().clone()
        }

        pub(crate) fn reset_count(&self) -> usize {
            *self.resets.lock()
        }
    }

    impl Notifier for RecordingNotifier {
        fn error(&self, message: &str) {
            self.errors.lock().push(message.to_string());
        }

        fn session_reset(&self) {
            *self.resets.lock() += 1;
        }
    }

    #[test]
    fn test_records_errors_and_resets() {
        let notifier = RecordingNotifier::default();
        notifier.error("Server error");
        notifier.session_reset();
        assert_eq!(notifier.errors(), vec!["Server error".to_string()]);
        assert_eq!(notifier.reset_count(), 1);
    }
}
