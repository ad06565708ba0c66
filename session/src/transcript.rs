//! Display transcript — maps a session snapshot into an ordered feed of
//! render-ready entries. Pure mapping, no state of its own.

use crate::controller::SessionSnapshot;
use crate::event::{AgentTag, MessageKind};

/// Visual role of a feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedRole {
    System,
    Synthesis,
    Expansion,
    Compression,
    /// Agent output with a tag the client does not style specially.
    Agent,
}

/// One render-ready transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub role: FeedRole,
    pub title: String,
    pub content: String,
}

impl FeedEntry {
    fn system(title: &str, content: impl Into<String>) -> Self {
        Self {
            role: FeedRole::System,
            title: title.to_string(),
            content: content.into(),
        }
    }
}

/// Build the display feed for a snapshot.
///
/// `show_debate` toggles whether per-agent round outputs appear;
/// clarification and synthesis entries always do. Messages with empty
/// content are skipped.
pub fn build_feed(snapshot: &SessionSnapshot, show_debate: bool) -> Vec<FeedEntry> {
    let mut feed = Vec::new();

    let Some(session_id) = &snapshot.session_id else {
        feed.push(FeedEntry::system("Welcome", "What's on your mind today?"));
        if let Some(error) = &snapshot.error {
            feed.push(FeedEntry::system("Error", error.clone()));
        }
        return feed;
    };

    let short_id: String = session_id.chars().take(8).collect();
    feed.push(FeedEntry::system(
        "Session",
        format!("Connected • {}… • State: {}", short_id, snapshot.phase),
    ));

    for message in &snapshot.messages {
        if message.content.is_empty() {
            continue;
        }

        match (&message.agent, message.kind) {
            (Some(AgentTag::Clarification), _) => {
                feed.push(FeedEntry::system("Clarification", message.content.clone()));
            }
            (Some(AgentTag::Synthesis), _) | (_, MessageKind::Synthesis) => {
                feed.push(FeedEntry {
                    role: FeedRole::Synthesis,
                    title: "Synthesis".to_string(),
                    content: message.content.clone(),
                });
            }
            (agent, MessageKind::AgentOutput) => {
                if !show_debate {
                    continue;
                }
                let (role, title) = match agent {
                    Some(AgentTag::Expansion) => {
                        (FeedRole::Expansion, "Agent A (Expansion)".to_string())
                    }
                    Some(AgentTag::Compression) => {
                        (FeedRole::Compression, "Agent B (Compression)".to_string())
                    }
                    Some(tag) => (FeedRole::Agent, tag.to_string()),
                    None => (FeedRole::Agent, "Agent".to_string()),
                };
                feed.push(FeedEntry {
                    role,
                    title,
                    content: message.content.clone(),
                });
            }
        }
    }

    if let Some(error) = &snapshot.error {
        feed.push(FeedEntry::system("Error", error.clone()));
    }

    feed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::SessionController;
    use crate::event::ServerEvent;

    fn snapshot_with(events: Vec<ServerEvent>) -> SessionSnapshot {
        let mut ctrl = SessionController::new();
        ctrl.adopt("0a1b2c3d-ffff-4000-8000-000000000000", "ROUND_PROCESSING");
        for event in events {
            ctrl.apply(event);
        }
        ctrl.snapshot()
    }

    fn output(agent: &str, content: &str) -> ServerEvent {
        ServerEvent::AgentOutput {
            content: content.to_string(),
            agent: Some(agent.to_string()),
            round: Some(1),
        }
    }

    #[test]
    fn test_no_session_shows_welcome() {
        let ctrl = SessionController::new();
        let feed = build_feed(&ctrl.snapshot(), false);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].title, "Welcome");
    }

    #[test]
    fn test_no_session_with_error_appends_entry() {
        let mut ctrl = SessionController::new();
        ctrl.record_error("init failed");
        let feed = build_feed(&ctrl.snapshot(), false);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[1].title, "Error");
        assert_eq!(feed[1].content, "init failed");
    }

    #[test]
    fn test_session_banner_truncates_id() {
        let feed = build_feed(&snapshot_with(vec![]), false);
        assert_eq!(feed.len(), 1);
        assert!(feed[0].content.contains("0a1b2c3d…"));
        assert!(feed[0].content.contains("ROUND_PROCESSING"));
    }

    #[test]
    fn test_debate_hidden_by_default() {
        let snapshot = snapshot_with(vec![output("EXPANSION", "widen"), output("COMPRESSION", "cut")]);
        let feed = build_feed(&snapshot, false);
        // Banner only — agent outputs are collapsed.
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn test_debate_shown_when_toggled() {
        let snapshot = snapshot_with(vec![output("EXPANSION", "widen"), output("COMPRESSION", "cut")]);
        let feed = build_feed(&snapshot, true);
        assert_eq!(feed.len(), 3);
        assert_eq!(feed[1].role, FeedRole::Expansion);
        assert_eq!(feed[1].title, "Agent A (Expansion)");
        assert_eq!(feed[2].role, FeedRole::Compression);
        assert_eq!(feed[2].title, "Agent B (Compression)");
    }

    #[test]
    fn test_synthesis_always_visible() {
        let snapshot = snapshot_with(vec![ServerEvent::Synthesis {
            content: "the combined view".to_string(),
            agent: Some("SYNTHESIS".to_string()),
            round: None,
        }]);
        let feed = build_feed(&snapshot, false);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[1].role, FeedRole::Synthesis);
    }

    #[test]
    fn test_clarification_rendered_as_system() {
        let snapshot = snapshot_with(vec![output("CLARIFICATION", "1) scope? 2) budget?")]);
        let feed = build_feed(&snapshot, false);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[1].role, FeedRole::System);
        assert_eq!(feed[1].title, "Clarification");
    }

    #[test]
    fn test_empty_content_skipped() {
        let snapshot = snapshot_with(vec![output("EXPANSION", "")]);
        let feed = build_feed(&snapshot, true);
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn test_unrecognized_tag_uses_raw_title() {
        let snapshot = snapshot_with(vec![output("MODERATOR", "keep it civil")]);
        let feed = build_feed(&snapshot, true);
        assert_eq!(feed[1].role, FeedRole::Agent);
        assert_eq!(feed[1].title, "MODERATOR");
    }
}
