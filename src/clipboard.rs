//! Clipboard access and the transient "copied" indicator.
//!
//! [`CopyFeedback`] raises a flag when a copy succeeds and lowers it again
//! after a fixed delay (2000 ms by default). Each copy cancels the reset
//! scheduled by the previous one, so only the latest timer can lower the
//! flag.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DEFAULT_COPY_RESET_MS;
use crate::errors::{LicenseError, LicenseResult};

/// Something that can receive text for the user to paste.
pub trait ClipboardWriter: Send + Sync {
    fn write_text(&self, text: &str) -> LicenseResult<()>;
}

/// The system clipboard via `arboard`.
///
/// On Linux the selection is served by this process. A short-lived process
/// (the CLI) must use [`SystemClipboard::until_handoff`], which blocks until
/// a clipboard manager or another application takes ownership, or the text
/// is gone the moment the process exits.
#[cfg(feature = "clipboard")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    wait_for_handoff: bool,
}

#[cfg(feature = "clipboard")]
impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep serving the copied text until another owner replaces it.
    pub fn until_handoff() -> Self {
        Self {
            wait_for_handoff: true,
        }
    }
}

#[cfg(feature = "clipboard")]
impl ClipboardWriter for SystemClipboard {
    fn write_text(&self, text: &str) -> LicenseResult<()> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| LicenseError::ClipboardError(format!("failed to open clipboard: {e}")))?;

        // Platform-specific handling for Linux
        #[cfg(target_os = "linux")]
        {
            use arboard::SetExtLinux;
            if self.wait_for_handoff {
                return clipboard
                    .set()
                    .wait()
                    .text(text)
                    .map_err(|e| LicenseError::ClipboardError(format!("failed to set clipboard: {e}")));
            }
        }

        clipboard
            .set_text(text)
            .map_err(|e| LicenseError::ClipboardError(format!("failed to set clipboard: {e}")))
    }
}

/// Clipboard kept in memory. Used headless and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard whose every write fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Most recently written text.
    pub fn last(&self) -> Option<String> {
        self.contents.lock().last().cloned()
    }

    pub fn writes(&self) -> usize {
        self.contents.lock().len()
    }
}

impl ClipboardWriter for MemoryClipboard {
    fn write_text(&self, text: &str) -> LicenseResult<()> {
        if self.fail {
            return Err(LicenseError::ClipboardError(
                "clipboard unavailable".to_string(),
            ));
        }
        self.contents.lock().push(text.to_string());
        Ok(())
    }
}

/// Copies text and tracks the short-lived "copied" flag.
pub struct CopyFeedback {
    writer: Box<dyn ClipboardWriter>,
    copied: Arc<AtomicBool>,
    pending: Arc<Mutex<Option<CancellationToken>>>,
    reset_delay: Duration,
}

impl CopyFeedback {
    pub fn new(writer: Box<dyn ClipboardWriter>) -> Self {
        Self::with_reset_delay(writer, Duration::from_millis(DEFAULT_COPY_RESET_MS))
    }

    pub fn with_reset_delay(writer: Box<dyn ClipboardWriter>, reset_delay: Duration) -> Self {
        Self {
            writer,
            copied: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(Mutex::new(None)),
            reset_delay,
        }
    }

    pub fn is_copied(&self) -> bool {
        self.copied.load(Ordering::SeqCst)
    }

    pub fn reset_delay(&self) -> Duration {
        self.reset_delay
    }

    /// Put `text` on the clipboard.
    ///
    /// The flag is raised only if the write succeeded. The reset timer runs
    /// on the current tokio runtime; without one nothing is written and a
    /// `ClipboardError` is returned.
    pub fn copy(&self, text: &str) -> LicenseResult<()> {
        let runtime = Handle::try_current().map_err(|e| {
            LicenseError::ClipboardError(format!("copy feedback needs a tokio runtime: {e}"))
        })?;

        if let Err(e) = self.writer.write_text(text) {
            warn!(error = %e, "Clipboard write failed");
            return Err(e);
        }

        let token = CancellationToken::new();
        {
            let mut pending = self.pending.lock();
            if let Some(previous) = pending.replace(token.clone()) {
                previous.cancel();
            }
            self.copied.store(true, Ordering::SeqCst);
        }
        debug!(delay_ms = self.reset_delay.as_millis() as u64, "Copied to clipboard");

        let copied = Arc::clone(&self.copied);
        let pending = Arc::clone(&self.pending);
        let delay = self.reset_delay;
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // Checked under the lock so a newer copy cannot be undone.
                    let mut pending = pending.lock();
                    if !token.is_cancelled() {
                        copied.store(false, Ordering::SeqCst);
                        pending.take();
                    }
                }
            }
        });

        Ok(())
    }

    /// Lower the flag now and drop any pending reset.
    pub fn reset(&self) {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.cancel();
        }
        self.copied.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for CopyFeedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyFeedback")
            .field("copied", &self.is_copied())
            .field("reset_delay", &self.reset_delay)
            .finish_non_exhaustive()
    }
}
