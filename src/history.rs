//! Chat history
//!
//! Past turns per session, fed back to the model as context. The in-memory
//! store keeps everything for the lifetime of the process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::agentic::{ChatMessage, Role};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        session_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            metadata,
            created_at: Utc::now(),
        }
    }

    /// The entry as a conversation turn; only user and assistant turns are
    /// replayed.
    pub fn to_message(&self) -> Option<ChatMessage> {
        match self.role {
            Role::User => Some(ChatMessage::user(self.content.clone())),
            Role::Assistant => Some(ChatMessage::assistant(self.content.clone())),
            Role::System | Role::Tool => None,
        }
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(
        &self,
        role: Role,
        content: &str,
        session_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<HistoryEntry>;

    /// Up to `limit` most recent entries no older than `max_age_days`,
    /// oldest first
    async fn recent(
        &self,
        session_id: &str,
        limit: usize,
        max_age_days: i64,
    ) -> Result<Vec<HistoryEntry>>;

    /// Remove a session's history, returning how many entries were dropped
    async fn clear(&self, session_id: &str) -> Result<usize>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryHistoryStore {
    sessions: Arc<RwLock<HashMap<String, Vec<HistoryEntry>>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a prebuilt entry as-is
    pub async fn insert(&self, entry: HistoryEntry) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(entry.session_id.clone())
            .or_default()
            .push(entry);
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(
        &self,
        role: Role,
        content: &str,
        session_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<HistoryEntry> {
        let entry = HistoryEntry::new(session_id, role, content, metadata);
        self.insert(entry.clone()).await;
        Ok(entry)
    }

    async fn recent(
        &self,
        session_id: &str,
        limit: usize,
        max_age_days: i64,
    ) -> Result<Vec<HistoryEntry>> {
        let cutoff = Utc::now() - Duration::days(max_age_days);
        let sessions = self.sessions.read().await;
        let Some(entries) = sessions.get(session_id) else {
            return Ok(Vec::new());
        };

        let mut recent: Vec<HistoryEntry> = entries
            .iter()
            .rev()
            .filter(|e| e.created_at >= cutoff)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    async fn clear(&self, session_id: &str) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(session_id).map_or(0, |entries| entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recent_in_order_and_bounded() {
        let store = InMemoryHistoryStore::new();
        for i in 0..5 {
            store
                .append(Role::User, &format!("q{}", i), "s1", None)
                .await
                .unwrap();
        }
        store.append(Role::User, "other", "s2", None).await.unwrap();

        let recent = store.recent("s1", 3, 7).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["q2", "q3", "q4"]);
    }

    #[tokio::test]
    async fn test_old_entries_excluded() {
        let store = InMemoryHistoryStore::new();
        let mut old = HistoryEntry::new("s1", Role::User, "ancient", None);
        old.created_at = Utc::now() - Duration::days(30);
        store.insert(old).await;
        store.append(Role::Assistant, "fresh", "s1", None).await.unwrap();

        let recent = store.recent("s1", 10, 7).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "fresh");
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryHistoryStore::new();
        store.append(Role::User, "a", "s1", None).await.unwrap();
        store.append(Role::Assistant, "b", "s1", None).await.unwrap();
        assert_eq!(store.clear("s1").await.unwrap(), 2);
        assert!(store.recent("s1", 10, 7).await.unwrap().is_empty());
        assert_eq!(store.clear("missing").await.unwrap(), 0);
    }

    #[test]
    fn test_only_dialogue_replayed() {
        assert!(HistoryEntry::new("s", Role::Tool, "{}", None).to_message().is_none());
        assert_eq!(
            HistoryEntry::new("s", Role::User, "hi", None).to_message(),
            Some(ChatMessage::user("hi"))
        );
    }
}
