// src/parser/mod.rs
// Conversation Parser (C2, spec §4.2): turns one accessibility-tree snapshot
// into a structured `ConversationSnapshot`.

pub mod timestamp;

use crate::error::Result;
use crate::tree::{with_deadline, ElementId, TreeAdapter};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// The kind of a message, a closed tagged variant per spec §9's "Dynamic
/// dispatch over message shapes" note — downstream logic dispatches on this
/// tag rather than subclassing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Regular,
    ThreadReply,
    System,
    Bot,
}

/// The channel shape a snapshot was observed in (spec §3's `Channel.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Public,
    Private,
    Dm,
    GroupDm,
    Thread,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Public => "public",
            ChannelType::Private => "private",
            ChannelType::Dm => "dm",
            ChannelType::GroupDm => "group_dm",
            ChannelType::Thread => "thread",
        }
    }
}

/// One message as extracted from the tree, before normalization (C3).
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub sender: String,
    pub timestamp_text: Option<String>,
    pub ts_source: Option<DateTime<Utc>>,
    pub content: String,
    pub kind: MessageKind,
    pub thread_parent_text: Option<String>,
    pub reactions: Vec<(String, u32)>,
    pub mentions_raw: Vec<String>,
    pub attachment_names: Vec<String>,
}

/// One parsed observation of a single chat window at one moment (spec §3
/// Glossary: Snapshot).
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    pub workspace: String,
    pub channel: String,
    pub channel_type: ChannelType,
    pub window_title: String,
    pub thread_parent_hint: Option<String>,
    pub messages: Vec<RawMessage>,
}

/// Stateless parser over one `TreeAdapter` snapshot (spec §4.2: "The parser
/// is stateless between snapshots").
pub struct ConversationParser<'a, T: TreeAdapter> {
    tree: &'a T,
    max_children: usize,
    max_value: usize,
}

impl<'a, T: TreeAdapter> ConversationParser<'a, T> {
    pub fn new(tree: &'a T, max_children: usize, max_value: usize) -> Self {
        Self {
            tree,
            max_children,
            max_value,
        }
    }

    /// Run the full algorithm from spec §4.2: locate the focused window,
    /// extract workspace/channel from its title and sidebar selection,
    /// locate the message list, and extract one `RawMessage` per
    /// message-shaped child in document order.
    pub async fn parse(&self) -> Result<Option<ConversationSnapshot>> {
        let deadline = self.tree.default_deadline();
        let window = match with_deadline(deadline, self.focused_window()).await? {
            Some(w) => w,
            None => return Ok(None),
        };

        let window_title = self.tree.attribute(window, "title")?.unwrap_or_default();
        let (workspace, channel) = match extract_workspace_and_channel(&window_title) {
            Some(pair) => pair,
            None => return Ok(None), // step 1: missing workspace/channel -> emit nothing
        };

        let channel_type = self
            .tree
            .attribute(window, "channel_type")?
            .and_then(|s| parse_channel_type(&s))
            .unwrap_or(ChannelType::Public);

        let thread_parent_hint = if channel_type == ChannelType::Thread {
            self.tree.attribute(window, "thread_parent")?
        } else {
            None
        };

        let message_list = match self.find_message_list(window)? {
            Some(list) => list,
            None => return Ok(None),
        };

        let mut messages = Vec::new();
        for child in self.tree.children(message_list, self.max_children)? {
            if let Some(message) = self.extract_message(child, channel_type)? {
                messages.push(message);
            }
        }

        Ok(Some(ConversationSnapshot {
            workspace,
            channel,
            channel_type,
            window_title,
            thread_parent_hint,
            messages,
        }))
    }

    async fn focused_window(&self) -> Result<Option<ElementId>> {
        self.tree.focused_window().await
    }

    /// Locate a list-like container whose descendants are message-shaped
    /// groups (spec §4.2 step 2). The heuristic here is role/subrole-based,
    /// matching a chat app's accessibility labeling convention.
    fn find_message_list(&self, window: ElementId) -> Result<Option<ElementId>> {
        let top_children = self.tree.children(window, self.max_children)?;
        for child in top_children {
            let role = self.tree.role(child)?;
            let subrole = self.tree.subrole(child)?;
            if role == "AXList" || subrole.as_deref() == Some("message_list") {
                return Ok(Some(child));
            }
            // One level deeper: some chat apps nest the list inside a
            // scroll-area group.
            for grandchild in self.tree.children(child, self.max_children)? {
                let role = self.tree.role(grandchild)?;
                let subrole = self.tree.subrole(grandchild)?;
                if role == "AXList" || subrole.as_deref() == Some("message_list") {
                    return Ok(Some(grandchild));
                }
            }
        }
        Ok(None)
    }

    /// Extract one message-shaped child (spec §4.2 step 3). Truncated or
    /// virtualized rows (no sender and no content) are skipped — they will
    /// reappear on a later tick once the UI materializes them.
    fn extract_message(
        &self,
        element: ElementId,
        channel_type: ChannelType,
    ) -> Result<Option<RawMessage>> {
        let sender = self.tree.attribute(element, "sender")?;
        let content = self
            .tree
            .value(element, self.max_value)?
            .or(self.tree.attribute(element, "content")?);

        let (sender, content) = match (sender, content) {
            (Some(s), Some(c)) if !s.trim().is_empty() => (s, c),
            _ => return Ok(None), // truncated/virtualized row
        };

        let timestamp_text = self.tree.attribute(element, "timestamp")?;
        let ts_source = timestamp_text
            .as_deref()
            .and_then(|raw| timestamp::try_parse(raw));

        let kind_hint = self.tree.attribute(element, "kind")?;
        let kind = match kind_hint.as_deref() {
            Some("system") => MessageKind::System,
            Some("bot") => MessageKind::Bot,
            _ if channel_type == ChannelType::Thread => MessageKind::ThreadReply,
            _ => MessageKind::Regular,
        };

        let thread_parent_text = self.tree.attribute(element, "thread_parent")?;
        let reactions = self.extract_reactions(element)?;
        let mentions_raw = extract_mention_tokens(&content);
        let attachment_names = self.extract_attachments(element)?;

        Ok(Some(RawMessage {
            sender,
            timestamp_text,
            ts_source,
            content,
            kind,
            thread_parent_text,
            reactions,
            mentions_raw,
            attachment_names,
        }))
    }

    fn extract_reactions(&self, element: ElementId) -> Result<Vec<(String, u32)>> {
        let mut reactions = Vec::new();
        let reactions_container = self.tree.attribute(element, "reactions")?;
        if let Some(raw) = reactions_container {
            // Reactions are surfaced as a compact "emoji:count,emoji:count"
            // attribute string by chat apps that don't expose a nested
            // accessibility subtree per reaction.
            for entry in raw.split(',').filter(|s| !s.trim().is_empty()) {
                if let Some((emoji, count)) = entry.split_once(':') {
                    if let Ok(count) = count.trim().parse::<u32>() {
                        reactions.push((emoji.trim().to_string(), count));
                    }
                }
            }
        }
        Ok(reactions)
    }

    fn extract_attachments(&self, element: ElementId) -> Result<Vec<String>> {
        let attachments = self.tree.attribute(element, "attachments")?;
        Ok(attachments
            .map(|raw| {
                raw.split(';')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Parse `"Workspace — #channel"`-style window titles (spec §4.2 step 1).
/// Falls back to a `workspace` accessibility attribute being unavailable by
/// returning `None`, which the caller treats as "emit nothing".
fn extract_workspace_and_channel(window_title: &str) -> Option<(String, String)> {
    let separators = ["—", " - ", " · "];
    for sep in separators {
        if let Some((workspace, channel)) = window_title.split_once(sep) {
            let workspace = workspace.trim();
            let channel = channel.trim().trim_start_matches('#').trim();
            if !workspace.is_empty() && !channel.is_empty() {
                return Some((workspace.to_string(), channel.to_string()));
            }
        }
    }
    None
}

fn parse_channel_type(raw: &str) -> Option<ChannelType> {
    match raw {
        "public" => Some(ChannelType::Public),
        "private" => Some(ChannelType::Private),
        "dm" => Some(ChannelType::Dm),
        "group_dm" => Some(ChannelType::GroupDm),
        "thread" => Some(ChannelType::Thread),
        _ => None,
    }
}

/// Pull `@name` tokens out of message content (spec §4.2 step 3). C3 does the
/// authoritative mention extraction against normalized text; this is a cheap
/// pre-pass the parser attaches to the raw message for display purposes.
fn extract_mention_tokens(content: &str) -> Vec<String> {
    content
        .split_whitespace()
        .filter_map(|token| token.strip_prefix('@'))
        .map(|name| name.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{MockElement, MockTree};

    fn build_simple_tree() -> (MockTree, ElementId) {
        let mut tree = MockTree::new();
        let window = tree.insert(
            MockElement::new("AXWindow")
                .with_attribute("title", "acme — #general")
                .with_attribute("channel_type", "public"),
            None,
        );
        let list = tree.insert(MockElement::new("AXList"), Some(window));
        let message = tree.insert(
            MockElement::new("AXGroup")
                .with_attribute("sender", "alice")
                .with_attribute("timestamp", "2024-06-24T14:30:00Z")
                .with_attribute("content", "Hello World"),
            Some(list),
        );
        let _ = message;
        tree.set_focused(window);
        (tree, window)
    }

    #[tokio::test]
    async fn parses_single_message_snapshot() {
        let (tree, _) = build_simple_tree();
        let parser = ConversationParser::new(&tree, 1_000, 1_000_000);
        let snapshot = parser.parse().await.expect("parse ok").expect("snapshot");
        assert_eq!(snapshot.workspace, "acme");
        assert_eq!(snapshot.channel, "general");
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].sender, "alice");
        assert!(snapshot.messages[0].ts_source.is_some());
    }

    #[tokio::test]
    async fn missing_window_title_emits_nothing() {
        let mut tree = MockTree::new();
        let window = tree.insert(MockElement::new("AXWindow"), None);
        tree.set_focused(window);
        let parser = ConversationParser::new(&tree, 1_000, 1_000_000);
        assert!(parser.parse().await.expect("parse ok").is_none());
    }

    #[tokio::test]
    async fn truncated_row_without_sender_is_skipped() {
        let (mut tree, window) = {
            let mut tree = MockTree::new();
            let window = tree.insert(
                MockElement::new("AXWindow")
                    .with_attribute("title", "acme — #general")
                    .with_attribute("channel_type", "public"),
                None,
            );
            (tree, window)
        };
        let list = tree.insert(MockElement::new("AXList"), Some(window));
        tree.insert(MockElement::new("AXGroup"), Some(list)); // no sender/content
        tree.set_focused(window);
        let parser = ConversationParser::new(&tree, 1_000, 1_000_000);
        let snapshot = parser.parse().await.expect("parse ok").expect("snapshot");
        assert!(snapshot.messages.is_empty());
    }
}
