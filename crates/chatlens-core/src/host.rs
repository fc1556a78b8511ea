//! Seam between the capture core and the hosting page.
//!
//! The core never touches a DOM directly. The embedding layer (a content
//! script binding, a test harness) implements [`ComposerHost`]; adapters
//! call through it for prompt insertion, model detection and the odd
//! first-turn fallback where a platform ships a placeholder instead of the
//! real user text.

use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::Result;

/// Access to the hosting page's composer and visible text.
pub trait ComposerHost: Send + Sync {
    /// Replace the composer's content with prepared HTML and fire the
    /// platform's input notification.
    fn set_composer_html(&self, selector: &str, html: &str) -> Result<()>;

    /// Insert plain text through an editing command.
    fn exec_insert_text(&self, selector: &str, text: &str) -> Result<()>;

    /// Emulate a clipboard paste of the text into the composer.
    fn paste_text(&self, selector: &str, text: &str) -> Result<()>;

    /// Text content of the first element matching the selector, `None`
    /// when nothing matches.
    fn query_text(&self, selector: &str) -> Result<Option<String>>;
}

/// Host with no page attached; every interaction fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl ComposerHost for NullHost {
    fn set_composer_html(&self, _selector: &str, _html: &str) -> Result<()> {
        Err(CaptureError::DomInteraction("no page attached".into()))
    }

    fn exec_insert_text(&self, _selector: &str, _text: &str) -> Result<()> {
        Err(CaptureError::DomInteraction("no page attached".into()))
    }

    fn paste_text(&self, _selector: &str, _text: &str) -> Result<()> {
        Err(CaptureError::DomInteraction("no page attached".into()))
    }

    fn query_text(&self, _selector: &str) -> Result<Option<String>> {
        Err(CaptureError::DomInteraction("no page attached".into()))
    }
}

/// Write content into a composer using layered fallbacks.
///
/// Strategies in order: direct HTML assignment (content escaped into
/// paragraph markup), editing-command insertion, clipboard-paste
/// emulation. Returns `false` only when every strategy fails; errors never
/// propagate to the caller.
pub fn insert_with_fallbacks(host: &dyn ComposerHost, selector: &str, content: &str) -> bool {
    let normalized = content.replace("\r\n", "\n");

    match host.set_composer_html(selector, &paragraphs_html(&normalized)) {
        Ok(()) => return true,
        Err(e) => {
            warn!(target: "chatlens::host", "HTML assignment failed, trying insert command: {}", e);
        }
    }

    match host.exec_insert_text(selector, &normalized) {
        Ok(()) => return true,
        Err(e) => {
            warn!(target: "chatlens::host", "Insert command failed, trying paste: {}", e);
        }
    }

    match host.paste_text(selector, &normalized) {
        Ok(()) => true,
        Err(e) => {
            debug!(target: "chatlens::host", "All insertion strategies failed: {}", e);
            false
        }
    }
}

/// Convert plain text into paragraph markup, one `<p>` per line.
fn paragraphs_html(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                "<p><br></p>".to_string()
            } else {
                format!("<p>{}</p>", escape_html(line))
            }
        })
        .collect()
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Host that fails the first `failures` strategies and records what
    /// finally got written.
    struct LayeredHost {
        failures: usize,
        calls: Mutex<Vec<(&'static str, String)>>,
    }

    impl LayeredHost {
        fn failing(failures: usize) -> Self {
            Self {
                failures,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn attempt(&self, strategy: &'static str, order: usize, payload: &str) -> Result<()> {
            if order < self.failures {
                return Err(CaptureError::DomInteraction(format!("{} refused", strategy)));
            }
            self.calls.lock().unwrap().push((strategy, payload.to_string()));
            Ok(())
        }
    }

    impl ComposerHost for LayeredHost {
        fn set_composer_html(&self, _selector: &str, html: &str) -> Result<()> {
            self.attempt("html", 0, html)
        }
        fn exec_insert_text(&self, _selector: &str, text: &str) -> Result<()> {
            self.attempt("exec", 1, text)
        }
        fn paste_text(&self, _selector: &str, text: &str) -> Result<()> {
            self.attempt("paste", 2, text)
        }
        fn query_text(&self, _selector: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn test_first_strategy_wins() {
        let host = LayeredHost::failing(0);
        assert!(insert_with_fallbacks(&host, "#composer", "hello"));
        let calls = host.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "html");
        assert_eq!(calls[0].1, "<p>hello</p>");
    }

    #[test]
    fn test_falls_through_to_paste() {
        let host = LayeredHost::failing(2);
        assert!(insert_with_fallbacks(&host, "#composer", "hello"));
        assert_eq!(host.calls.lock().unwrap()[0].0, "paste");
    }

    #[test]
    fn test_returns_false_when_everything_fails() {
        assert!(!insert_with_fallbacks(&NullHost, "#composer", "hello"));
    }

    #[test]
    fn test_never_panics_on_hostile_content() {
        for content in [
            "",
            "line1\nline2\n\nline4",
            "quotes \" and ' everywhere",
            "<script>alert('x')</script>",
            "crlf\r\nline",
            "emoji 🦀 and unicode é",
        ] {
            // both on a working host and a broken one
            let _ = insert_with_fallbacks(&LayeredHost::failing(0), "#c", content);
            let _ = insert_with_fallbacks(&NullHost, "#c", content);
        }
    }

    #[test]
    fn test_paragraph_markup_escapes_entities() {
        let host = LayeredHost::failing(0);
        insert_with_fallbacks(&host, "#c", "a < b & c\n\n\"quoted\"");
        let html = host.calls.lock().unwrap()[0].1.clone();
        assert_eq!(
            html,
            "<p>a &lt; b &amp; c</p><p><br></p><p>&quot;quoted&quot;</p>"
        );
    }

    #[test]
    fn test_crlf_normalized_before_insertion() {
        let host = LayeredHost::failing(1);
        insert_with_fallbacks(&host, "#c", "one\r\ntwo");
        assert_eq!(host.calls.lock().unwrap()[0].1, "one\ntwo");
    }
}
