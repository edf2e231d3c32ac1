//! In-memory transcript of the active room, with id-based de-duplication
//! of history, optimistic sends, and their echoes.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use shared::{
    domain::{MessageId, MessageKind, RoomId, UserId},
    protocol::HistoryRecord,
};

pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpeg", "jpg", "png", "gif", "webp", "svg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Image { url: String },
    Download { url: String },
}

impl Attachment {
    /// Guesses whether a file URL points to an image from its extension.
    /// Query strings and fragments do not count as part of the path.
    pub fn classify(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let is_image = path
            .rsplit_once('.')
            .map(|(stem, ext)| {
                !stem.is_empty()
                    && !ext.contains('/')
                    && IMAGE_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);

        if is_image {
            Self::Image {
                url: url.to_string(),
            }
        } else {
            Self::Download {
                url: url.to_string(),
            }
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Image { url } | Self::Download { url } => url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedBody {
    Text(String),
    Attachment(Attachment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Option<MessageId>,
    pub client_msg_id: Option<String>,
    pub sender: UserId,
    pub sender_name: Option<String>,
    pub room: RoomId,
    pub body: String,
    pub kind: MessageKind,
    pub file_url: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn from_history(record: HistoryRecord, room: &RoomId) -> Self {
        Self {
            id: record.id,
            client_msg_id: None,
            sender: record.sender,
            sender_name: record.sender_name,
            room: room.clone(),
            body: record.message,
            kind: record.kind,
            file_url: record.file_url,
            sent_at: record.sent_at,
        }
    }

    pub fn rendered(&self) -> RenderedBody {
        match self.kind {
            MessageKind::Text => RenderedBody::Text(self.body.clone()),
            MessageKind::File => {
                let url = self
                    .file_url
                    .as_deref()
                    .filter(|url| !url.is_empty())
                    .unwrap_or(&self.body);
                RenderedBody::Attachment(Attachment::classify(url))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    History,
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub message: ChatMessage,
    pub origin: EntryOrigin,
    /// Optimistic local send not yet seen back from the server.
    pub pending: bool,
}

impl TranscriptEntry {
    pub fn is_own(&self, user_id: UserId) -> bool {
        self.message.sender == user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Appended(usize),
    /// The echo of an optimistic send; the entry at this index was updated.
    Confirmed(usize),
    Duplicate,
    EchoSuppressed,
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    seen_ids: HashSet<MessageId>,
    pending: HashMap<String, usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends fetched history, skipping records whose id is already shown.
    /// Returns the number of entries added.
    pub fn seed_history(&mut self, records: Vec<HistoryRecord>, room: &RoomId) -> usize {
        let mut added = 0;
        for record in records {
            let message = ChatMessage::from_history(record, room);
            if let Some(id) = message.id {
                if !self.seen_ids.insert(id) {
                    continue;
                }
            }
            self.entries.push(TranscriptEntry {
                message,
                origin: EntryOrigin::History,
                pending: false,
            });
            added += 1;
        }
        added
    }

    pub fn push_local(&mut self, message: ChatMessage) -> usize {
        let index = self.entries.len();
        if let Some(client_msg_id) = &message.client_msg_id {
            self.pending.insert(client_msg_id.clone(), index);
        }
        self.entries.push(TranscriptEntry {
            message,
            origin: EntryOrigin::Local,
            pending: true,
        });
        index
    }

    pub fn apply_remote(&mut self, message: ChatMessage, me: UserId) -> RemoteOutcome {
        if let Some(id) = message.id {
            if self.seen_ids.contains(&id) {
                return RemoteOutcome::Duplicate;
            }
        }

        let matched = match &message.client_msg_id {
            Some(client_msg_id) => self.pending.remove(client_msg_id),
            // Server-assigned id without the client tag: the echo of the
            // oldest pending send with the same content.
            None if message.sender == me && message.id.is_some() => {
                self.take_pending_like(&message)
            }
            None => None,
        };
        if let Some(index) = matched {
            let entry = &mut self.entries[index];
            entry.pending = false;
            if let Some(id) = message.id {
                entry.message.id = Some(id);
                self.seen_ids.insert(id);
            }
            if message.sent_at.is_some() {
                entry.message.sent_at = message.sent_at;
            }
            return RemoteOutcome::Confirmed(index);
        }

        // Own message without a server id: nothing to reconcile against, so
        // treat it as the echo of a send this client already rendered.
        if message.sender == me && message.id.is_none() {
            return RemoteOutcome::EchoSuppressed;
        }

        if let Some(id) = message.id {
            self.seen_ids.insert(id);
        }
        let index = self.entries.len();
        self.entries.push(TranscriptEntry {
            message,
            origin: EntryOrigin::Remote,
            pending: false,
        });
        RemoteOutcome::Appended(index)
    }

    fn take_pending_like(&mut self, message: &ChatMessage) -> Option<usize> {
        let (key, index) = self
            .pending
            .iter()
            .filter(|(_, index)| {
                let local = &self.entries[**index].message;
                local.body == message.body
                    && local.kind == message.kind
                    && local.file_url == message.file_url
            })
            .min_by_key(|(_, index)| **index)
            .map(|(key, index)| (key.clone(), *index))?;
        self.pending.remove(&key);
        Some(index)
    }
}

#[cfg(test)]
#[path = "tests/transcript_tests.rs"]
mod tests;
