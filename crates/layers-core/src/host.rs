//! Capabilities supplied by the embedding page.
//!
//! Every capability is optional. Components receive a [`Host`] at
//! construction and degrade to a no-op (or "declined") when a capability is
//! missing.

use crate::storage::BoxFuture;
use crate::timer::{Clock, SystemClock};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Render failed: {0}")]
    Failed(String),
}

/// Paints the current layers onto the visible surface.
pub trait Renderer {
    fn render_layers(&self) -> Result<(), RenderError>;
}

/// Asks the user a yes/no question.
pub trait Confirm {
    /// Resolves to true when the user accepts.
    fn confirm(&self, message: &str) -> BoxFuture<'_, bool>;
}

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Shows transient messages to the user.
pub trait Notifier {
    fn notify(&self, message: &str, level: NotifyLevel);
}

/// Localized message lookup.
pub trait Messages {
    /// Message for `key` with `$1`, `$2`... replaced by `params`, or `None`
    /// if the key is unknown.
    fn message(&self, key: &str, params: &[&str]) -> Option<String>;
}

pub const MSG_DRAFT_RECOVER_PROMPT: &str = "layers-draft-recover-prompt";
pub const MSG_DRAFT_RECOVERED: &str = "layers-draft-recovered";
pub const MSG_DRAFT_RECOVER_FAILED: &str = "layers-draft-recover-failed";
pub const MSG_DRAFT_IMAGES_STRIPPED: &str = "layers-draft-images-stripped";

fn fallback_template(key: &str) -> Option<&'static str> {
    Some(match key {
        MSG_DRAFT_RECOVER_PROMPT => {
            "Unsaved changes to $1 layer(s) from $2 minute(s) ago were found. Recover them?"
        }
        MSG_DRAFT_RECOVERED => "Your unsaved changes were recovered.",
        MSG_DRAFT_RECOVER_FAILED => "Unsaved changes could not be recovered.",
        MSG_DRAFT_IMAGES_STRIPPED => {
            "$1 image layer(s) were too large to keep in the draft and must be re-added."
        }
        _ => return None,
    })
}

/// Replace `$1`..`$n` placeholders.
pub fn substitute(template: &str, params: &[&str]) -> String {
    let mut out = template.to_string();
    // Highest index first so `$1` does not clobber `$10`.
    for (index, param) in params.iter().enumerate().rev() {
        out = out.replace(&format!("${}", index + 1), param);
    }
    out
}

/// Built-in English messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishMessages;

impl Messages for EnglishMessages {
    fn message(&self, key: &str, params: &[&str]) -> Option<String> {
        fallback_template(key).map(|t| substitute(t, params))
    }
}

/// The capability bundle handed to session components.
#[derive(Clone)]
pub struct Host {
    pub renderer: Option<Rc<dyn Renderer>>,
    pub confirm: Option<Rc<dyn Confirm>>,
    pub notifier: Option<Rc<dyn Notifier>>,
    pub messages: Option<Rc<dyn Messages>>,
    pub clock: Rc<dyn Clock>,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("renderer", &self.renderer.is_some())
            .field("confirm", &self.confirm.is_some())
            .field("notifier", &self.notifier.is_some())
            .field("messages", &self.messages.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Host {
    fn default() -> Self {
        Self {
            renderer: None,
            confirm: None,
            notifier: None,
            messages: None,
            clock: Rc::new(SystemClock),
        }
    }
}

impl Host {
    /// No capabilities, real clock.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_renderer(mut self, renderer: Rc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_confirm(mut self, confirm: Rc<dyn Confirm>) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn with_notifier(mut self, notifier: Rc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_messages(mut self, messages: Rc<dyn Messages>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Localized text, falling back to English, then to the key itself.
    pub fn message(&self, key: &str, params: &[&str]) -> String {
        self.messages
            .as_ref()
            .and_then(|m| m.message(key, params))
            .or_else(|| EnglishMessages.message(key, params))
            .unwrap_or_else(|| key.to_string())
    }

    /// Redraw, logging failures. Returns whether the renderer succeeded.
    pub fn render(&self) -> bool {
        let Some(renderer) = &self.renderer else {
            return false;
        };
        match renderer.render_layers() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Renderer failed: {}", e);
                false
            }
        }
    }

    /// Show a notification if a notifier is present.
    pub fn notify(&self, message: &str, level: NotifyLevel) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(message, level);
        }
    }

    /// Ask for confirmation. A missing capability declines.
    pub async fn confirm(&self, message: &str) -> bool {
        match &self.confirm {
            Some(confirm) => confirm.confirm(message).await,
            None => {
                log::debug!("No confirmation capability, declining: {}", message);
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::test_util::block_on;

    struct Pirate;

    impl Messages for Pirate {
        fn message(&self, key: &str, _params: &[&str]) -> Option<String> {
            (key == MSG_DRAFT_RECOVERED).then(|| "Arr, yer changes be back.".to_string())
        }
    }

    #[test]
    fn test_substitute_params() {
        assert_eq!(substitute("$1 of $2", &["3", "10"]), "3 of 10");
        assert_eq!(substitute("no params", &[]), "no params");
    }

    #[test]
    fn test_message_fallback_chain() {
        let host = Host::new().with_messages(Rc::new(Pirate));
        assert_eq!(host.message(MSG_DRAFT_RECOVERED, &[]), "Arr, yer changes be back.");
        assert!(host
            .message(MSG_DRAFT_IMAGES_STRIPPED, &["2"])
            .starts_with("2 image layer(s)"));
        assert_eq!(host.message("unknown-key", &[]), "unknown-key");
    }

    #[test]
    fn test_missing_capabilities_are_no_ops() {
        let host = Host::new();
        assert!(!host.render());
        host.notify("nobody listens", NotifyLevel::Info);
        assert!(!block_on(host.confirm("recover?")));
    }

    #[test]
    fn test_render_failure_is_reported_not_raised() {
        let renderer = Rc::new(CountingRenderer::default());
        renderer.fail.set(true);
        let host = Host::new().with_renderer(renderer.clone());
        assert!(!host.render());
        assert_eq!(renderer.calls.get(), 1);
    }

    #[test]
    fn test_confirm_and_notify_delegate() {
        let confirm = Rc::new(FixedConfirm::new(true));
        let notifier = Rc::new(RecordingNotifier::default());
        let host = Host::new()
            .with_confirm(confirm.clone())
            .with_notifier(notifier.clone());
        assert!(block_on(host.confirm("recover?")));
        host.notify("done", NotifyLevel::Success);
        assert_eq!(confirm.asked.borrow().len(), 1);
        assert_eq!(notifier.seen.borrow()[0].1, NotifyLevel::Success);
    }
}
