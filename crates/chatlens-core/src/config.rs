//! Static per-platform descriptors and endpoint classification.
//!
//! One immutable descriptor per platform, constructed once at startup.
//! Endpoint tables mirror what each platform's web client actually calls;
//! they are matched against the pathname (plus query) of intercepted
//! requests.

use regex::Regex;

/// How a single endpoint is recognized.
#[derive(Debug, Clone)]
pub enum EndpointPattern {
    /// Pathname contains this substring
    Substring(&'static str),
    /// Pathname matches this expression
    Pattern(Regex),
}

impl EndpointPattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            EndpointPattern::Substring(s) => path.contains(s),
            EndpointPattern::Pattern(re) => re.is_match(path),
        }
    }
}

/// The kind of intercepted endpoint, in classification precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    SpecificConversation,
    UserInfo,
    ConversationsList,
    ChatCompletion,
}

/// Immutable static descriptor for one platform.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Registry name, lowercase
    pub name: &'static str,
    /// Hostname substrings this platform serves from
    pub hostnames: &'static [&'static str],
    /// Selector for the prompt composer element
    pub composer_selector: &'static str,
    /// Selector for the model picker, empty when the platform has none we read
    pub model_selector: &'static str,
    pub user_info: EndpointPattern,
    pub conversations_list: EndpointPattern,
    pub chat_completion: EndpointPattern,
    pub specific_conversation: EndpointPattern,
}

impl PlatformConfig {
    pub fn chatgpt() -> Self {
        Self {
            name: "chatgpt",
            hostnames: &["chatgpt.com", "chat.openai.com"],
            composer_selector: "#prompt-textarea",
            model_selector: "[data-testid=\"model-selector\"]",
            user_info: EndpointPattern::Substring("/backend-api/me"),
            conversations_list: EndpointPattern::Substring("/backend-api/conversations"),
            chat_completion: EndpointPattern::Substring("/backend-api/conversation"),
            specific_conversation: EndpointPattern::Pattern(
                Regex::new(r"/backend-api/conversation/([a-f0-9-]+)$").expect("static regex"),
            ),
        }
    }

    pub fn claude() -> Self {
        Self {
            name: "claude",
            hostnames: &["claude.ai"],
            composer_selector: "div[contenteditable=\"true\"].ProseMirror",
            model_selector: "[data-testid=\"model-selector-dropdown\"]",
            user_info: EndpointPattern::Substring("/api/user"),
            conversations_list: EndpointPattern::Pattern(
                Regex::new(r"/api/organizations/[a-f0-9-]+/chat_conversations").expect("static regex"),
            ),
            chat_completion: EndpointPattern::Pattern(
                Regex::new(r"/api/organizations/[a-f0-9-]+/chat_conversations/[a-f0-9-]+/completion")
                    .expect("static regex"),
            ),
            specific_conversation: EndpointPattern::Pattern(
                Regex::new(r"/api/organizations/[a-f0-9-]+/chat_conversations/([a-f0-9-]+)")
                    .expect("static regex"),
            ),
        }
    }

    pub fn mistral() -> Self {
        Self {
            name: "mistral",
            hostnames: &["chat.mistral.ai"],
            composer_selector: "textarea[name=\"message.text\"]",
            model_selector: "",
            user_info: EndpointPattern::Substring("/api/trpc/user.session"),
            conversations_list: EndpointPattern::Substring("/api/trpc/chat.list"),
            chat_completion: EndpointPattern::Substring("/api/chat"),
            specific_conversation: EndpointPattern::Pattern(
                Regex::new(r"/api/chat").expect("static regex"),
            ),
        }
    }

    pub fn copilot() -> Self {
        Self {
            name: "copilot",
            hostnames: &["copilot.microsoft.com"],
            composer_selector: "textarea#userInput",
            model_selector: "",
            user_info: EndpointPattern::Substring("/c/api/user"),
            conversations_list: EndpointPattern::Substring("/c/api/conversations"),
            chat_completion: EndpointPattern::Substring("/c/api/conversations"),
            specific_conversation: EndpointPattern::Pattern(
                Regex::new(r"/c/api/conversations/([a-zA-Z0-9-]+)/history").expect("static regex"),
            ),
        }
    }

    /// Classify a request URL against this platform's endpoint table.
    ///
    /// Precedence follows [`EndpointKind`] order: specific-conversation
    /// patterns are the most specific and must win over the broader
    /// completion/list substrings they overlap with.
    pub fn classify_endpoint(&self, url: &str) -> Option<EndpointKind> {
        let path = pathname_with_query(url);
        if self.specific_conversation.matches(path) {
            return Some(EndpointKind::SpecificConversation);
        }
        if self.user_info.matches(path) {
            return Some(EndpointKind::UserInfo);
        }
        if self.conversations_list.matches(path) {
            return Some(EndpointKind::ConversationsList);
        }
        if self.chat_completion.matches(path) {
            return Some(EndpointKind::ChatCompletion);
        }
        None
    }
}

/// Strip scheme and host from an absolute URL; relative paths pass through.
fn pathname_with_query(url: &str) -> &str {
    if let Some(rest) = url.split_once("://").map(|(_, rest)| rest) {
        match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "/",
        }
    } else {
        url
    }
}
