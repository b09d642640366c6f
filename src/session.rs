use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::types::Message;

pub const DEFAULT_TOPIC: &str = "New Conversation";
const FILE_EXTENSION: &str = "json";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Conversation {
    pub id: String,
    pub topic: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(topic: &str) -> Conversation {
        Conversation {
            id: Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    // Replace all messages
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.updated_at = Utc::now();
    }

    // Append one message
    pub fn add_message(&mut self, msg: Message) {
        self.messages.push(msg);
        self.updated_at = Utc::now();
    }

    pub fn set_topic(&mut self, topic: &str) {
        self.topic = topic.to_string();
        self.updated_at = Utc::now();
    }
}

/// Named conversations stored as one JSON file per topic.
pub struct ConversationStore {
    dir: PathBuf,
}

impl ConversationStore {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite `topic` with `messages`. Keeps the original creation time
    /// when the topic already exists.
    pub fn save(&self, topic: &str, messages: &[Message]) -> anyhow::Result<Conversation> {
        validate_topic(topic)?;
        if messages.is_empty() {
            bail!("Nothing to save");
        }

        let created_at = self
            .load(topic)
            .map(|c| c.created_at)
            .unwrap_or_else(|_| Utc::now());
        let mut conversation = Conversation::new(topic);
        conversation.created_at = created_at;
        conversation.replace_messages(messages.to_vec());

        let json = serde_json::to_string_pretty(&conversation)?;
        let path = self.path_for(topic);
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(%topic, messages = messages.len(), "conversation saved");
        Ok(conversation)
    }

    pub fn load(&self, topic: &str) -> anyhow::Result<Conversation> {
        validate_topic(topic)?;
        let path = self.path_for(topic);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("No saved conversation named '{}'", topic))?;
        let conversation: Conversation = serde_json::from_str(&raw)
            .with_context(|| format!("Conversation '{}' is corrupted", topic))?;
        Ok(conversation)
    }

    /// Saved topic names, sorted. Unreadable files are skipped.
    pub fn list(&self) -> anyhow::Result<Vec<String>> {
        let mut topics = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let Some(topic) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load(topic) {
                Ok(_) => topics.push(topic.to_string()),
                Err(e) => tracing::warn!(path = %path.display(), "skipping conversation: {:#}", e),
            }
        }
        topics.sort();
        Ok(topics)
    }

    /// Returns whether a file was removed.
    pub fn delete(&self, topic: &str) -> anyhow::Result<bool> {
        validate_topic(topic)?;
        let path = self.path_for(topic);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(%topic, "conversation deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("deleting {}", path.display())),
        }
    }

    fn path_for(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", topic, FILE_EXTENSION))
    }
}

pub fn validate_topic(topic: &str) -> anyhow::Result<()> {
    if topic.trim().is_empty() {
        bail!("Topic name cannot be empty");
    }
    if topic == "." || topic == ".." || topic.contains(['/', '\\']) || topic.chars().any(char::is_control) {
        bail!("Invalid topic name '{}'", topic);
    }
    Ok(())
}
