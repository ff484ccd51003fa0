use serde::Deserialize;

/// One line of a tool's structured event log, decoded just enough to decide
/// what to do with it. Unknown event kinds deserialize fine and are ignored
/// by the tailer rather than rejected — a new tool version adding an event
/// kind we don't know about should not break tailing.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    User,
    Assistant { message: AssistantMessage },
    Thinking,
    ToolUse,
    Processing,
    Summary,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub content: AssistantContent,
}

/// Some tools emit assistant content as a plain string, others as an array
/// of typed content blocks (text interleaved with tool-use calls).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AssistantContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { name: String },
    #[serde(other)]
    Other,
}

/// Flatten an assistant message's content into displayable text, and report
/// whether it contains a tool-use block (treated as a point where the tool
/// is waiting on something other than plain conversation).
pub fn extract_assistant_text(content: &AssistantContent) -> (String, bool) {
    match content {
        AssistantContent::Text(text) => (text.clone(), false),
        AssistantContent::Blocks(blocks) => {
            let mut parts = Vec::new();
            let mut saw_tool_use = false;
            for block in blocks {
                match block {
                    ContentBlock::Text { text } => parts.push(text.clone()),
                    ContentBlock::ToolUse { name } => {
                        parts.push(format!("[tool: {name}]"));
                        saw_tool_use = true;
                    }
                    ContentBlock::Other => {}
                }
            }
            (parts.join("\n"), saw_tool_use)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_content_passes_through() {
        let content = AssistantContent::Text("hello there".to_string());
        let (text, tool_use) = extract_assistant_text(&content);
        assert_eq!(text, "hello there");
        assert!(!tool_use);
    }

    #[test]
    fn block_content_flags_tool_use() {
        let json = r#"[{"type":"text","text":"one sec"},{"type":"tool_use","name":"bash"}]"#;
        let blocks: Vec<ContentBlock> = serde_json::from_str(json).unwrap();
        let (text, tool_use) = extract_assistant_text(&AssistantContent::Blocks(blocks));
        assert!(text.contains("one sec"));
        assert!(text.contains("[tool: bash]"));
        assert!(tool_use);
    }

    #[test]
    fn unknown_event_kind_parses_without_error() {
        let line = r#"{"type":"checkpoint","checkpointId":"c1"}"#;
        let event: LogEvent = serde_json::from_str(line).unwrap();
        assert!(matches!(event, LogEvent::Unknown));
    }
}
