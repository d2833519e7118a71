//! Diagnostic trace attached to chat replies, and the panel that shows it.
//!
//! The panel only ever shows the trace of the most recent turn that carried one.

use serde::{Deserialize, Serialize};

use crate::render::escape;

pub const DEFAULT_ICON: &str = "🟦";
pub const PLACEHOLDER_TEXT: &str = "No logs available.";

/// Entry type from the agent trace. Unknown strings are kept so they can still be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogType {
    Info,
    ToolCall,
    ToolResult,
    Error,
    Thinking,
    Success,
    System,
    Warning,
    Nudge,
    Other(String),
}

impl From<String> for LogType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "info" => LogType::Info,
            "tool_call" => LogType::ToolCall,
            "tool_result" => LogType::ToolResult,
            "error" => LogType::Error,
            "thinking" => LogType::Thinking,
            "success" => LogType::Success,
            "system" => LogType::System,
            "warning" => LogType::Warning,
            "nudge" => LogType::Nudge,
            _ => LogType::Other(s),
        }
    }
}

impl From<LogType> for String {
    fn from(t: LogType) -> Self {
        t.as_str().to_string()
    }
}

impl LogType {
    pub fn as_str(&self) -> &str {
        match self {
            LogType::Info => "info",
            LogType::ToolCall => "tool_call",
            LogType::ToolResult => "tool_result",
            LogType::Error => "error",
            LogType::Thinking => "thinking",
            LogType::Success => "success",
            LogType::System => "system",
            LogType::Warning => "warning",
            LogType::Nudge => "nudge",
            LogType::Other(s) => s,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            LogType::ToolCall => "🛠️",
            LogType::ToolResult => "✅",
            LogType::Error => "❌",
            LogType::Thinking => "🧠",
            LogType::Success => "🏁",
            LogType::System => "⚙️",
            LogType::Warning => "⚠️",
            LogType::Nudge => "👉",
            LogType::Info | LogType::Other(_) => DEFAULT_ICON,
        }
    }
}

/// One step of the agent trace as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugLogEntry {
    pub step: i64,
    #[serde(rename = "type")]
    pub typ: LogType,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Display form of an entry (plain text; see [`RenderedLogEntry::to_html`] for markup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLogEntry {
    pub step: i64,
    pub typ: LogType,
    /// `Step 1 • TOOL_CALL`
    pub header: String,
    /// `🛠️ sum_transactions`
    pub body: String,
    pub details: Option<String>,
}

impl RenderedLogEntry {
    fn from_entry(e: &DebugLogEntry) -> Self {
        Self {
            step: e.step,
            typ: e.typ.clone(),
            header: format!("Step {} • {}", e.step, e.typ.as_str().to_uppercase()),
            body: format!("{} {}", e.typ.icon(), e.content),
            details: e.details.clone().filter(|d| !d.is_empty()),
        }
    }

    pub fn to_html(&self) -> String {
        let details = self
            .details
            .as_deref()
            .map(|d| format!(r#"<div class="log-details">{}</div>"#, escape(d)))
            .unwrap_or_default();
        format!(
            r#"<div class="log-entry log-type-{}"><div class="log-step">{}</div><div class="log-content">{}</div>{}</div>"#,
            htmlescape::encode_attribute(self.typ.as_str()),
            escape(&self.header),
            escape(&self.body),
            details
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugPanelContent {
    Placeholder,
    Entries(Vec<RenderedLogEntry>),
}

/// Collapsible diagnostic panel. Content and visibility change independently.
#[derive(Debug, Clone)]
pub struct DebugLogPresenter {
    content: DebugPanelContent,
    visible: bool,
    scroll_to_latest: bool,
}

impl Default for DebugLogPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugLogPresenter {
    pub fn new() -> Self {
        Self {
            content: DebugPanelContent::Placeholder,
            visible: false,
            scroll_to_latest: false,
        }
    }

    /// Replace the whole panel with `entries`. None or empty shows the placeholder.
    pub fn render(&mut self, entries: Option<&[DebugLogEntry]>) {
        self.content = match entries {
            Some(list) if !list.is_empty() => {
                DebugPanelContent::Entries(list.iter().map(RenderedLogEntry::from_entry).collect())
            }
            _ => DebugPanelContent::Placeholder,
        };
        self.scroll_to_latest = true;
    }

    pub fn content(&self) -> &DebugPanelContent {
        &self.content
    }

    /// Rendered entries; empty when the placeholder is shown.
    pub fn entries(&self) -> &[RenderedLogEntry] {
        match &self.content {
            DebugPanelContent::Entries(e) => e,
            DebugPanelContent::Placeholder => &[],
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show/hide the panel. Opening requests a scroll to the latest entry.
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        if self.visible {
            self.scroll_to_latest = true;
        }
    }

    /// Returns true once after a render or open; adapters scroll to the bottom when set.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_latest)
    }

    pub fn to_html(&self) -> String {
        match &self.content {
            DebugPanelContent::Placeholder => {
                format!(r#"<div class="debug-placeholder">{}</div>"#, PLACEHOLDER_TEXT)
            }
            DebugPanelContent::Entries(list) => list.iter().map(|e| e.to_html()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(p: &mut DebugLogPresenter, entries: &[DebugLogEntry]) {
        p.render(Some(entries));
    }

    fn entry(step: i64, typ: &str, content: &str) -> DebugLogEntry {
        DebugLogEntry {
            step,
            typ: LogType::from(typ.to_string()),
            content: content.to_string(),
            details: None,
        }
    }

    #[test]
    fn header_and_icon_for_tool_call() {
        let mut p = DebugLogPresenter::new();
        show(&mut p, &[entry(1, "tool_call", "sum_transactions")]);
        let e = &p.entries()[0];
        assert_eq!(e.header, "Step 1 • TOOL_CALL");
        assert_eq!(e.body, "🛠️ sum_transactions");
    }

    #[test]
    fn new_trace_replaces_old_steps() {
        let mut p = DebugLogPresenter::new();
        show(&mut p, &[entry(1, "info", "a"), entry(2, "info", "b"), entry(3, "success", "c")]);
        show(&mut p, &[entry(7, "thinking", "d")]);
        let steps: Vec<i64> = p.entries().iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![7]);
        assert!(!p.to_html().contains("Step 1"));
    }

    #[test]
    fn empty_or_absent_shows_placeholder() {
        let mut p = DebugLogPresenter::new();
        show(&mut p, &[entry(1, "info", "a")]);
        show(&mut p, &[]);
        assert_eq!(p.content(), &DebugPanelContent::Placeholder);
        p.render(None);
        assert!(p.to_html().contains(PLACEHOLDER_TEXT));
    }

    #[test]
    fn unknown_type_falls_back_to_default_icon() {
        let e: DebugLogEntry =
            serde_json::from_str(r#"{"step":4,"type":"telemetry","content":"x"}"#).unwrap();
        assert_eq!(e.typ, LogType::Other("telemetry".into()));
        assert_eq!(e.typ.icon(), DEFAULT_ICON);
        let r = RenderedLogEntry::from_entry(&e);
        assert_eq!(r.header, "Step 4 • TELEMETRY");
    }

    #[test]
    fn content_and_details_are_escaped() {
        let mut p = DebugLogPresenter::new();
        show(&mut p, &[DebugLogEntry {
            step: 1,
            typ: LogType::ToolResult,
            content: "<b>bold</b>".into(),
            details: Some("<img src=x onerror=alert(1)>".into()),
        }]);
        let html = p.to_html();
        assert!(!html.contains("<b>"));
        assert!(!html.contains("<img"));
        assert!(html.contains("log-details"));
    }

    #[test]
    fn opening_requests_scroll() {
        let mut p = DebugLogPresenter::new();
        assert!(!p.take_scroll_request());
        p.toggle();
        assert!(p.is_visible());
        assert!(p.take_scroll_request());
        assert!(!p.take_scroll_request());
        p.toggle();
        assert!(!p.is_visible());
        assert!(!p.take_scroll_request());
    }

    #[test]
    fn type_round_trips_through_string() {
        let e = entry(2, "nudge", "go");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "nudge");
    }
}
