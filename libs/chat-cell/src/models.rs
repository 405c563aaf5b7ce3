use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of a conversation an actor sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    Patient,
    Doctor,
}

impl ActorKind {
    /// The only valid peer kind: conversations are strictly patient<->doctor.
    pub fn complement(&self) -> ActorKind {
        match self {
            ActorKind::Patient => ActorKind::Doctor,
            ActorKind::Doctor => ActorKind::Patient,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::Patient => "patient",
            ActorKind::Doctor => "doctor",
        }
    }

    /// Maps a JWT role claim onto an actor kind, if it names one.
    pub fn from_role(role: &str) -> Option<ActorKind> {
        match role {
            "patient" => Some(ActorKind::Patient),
            "doctor" => Some(ActorKind::Doctor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: Uuid,
    pub kind: ActorKind,
}

/// A persisted chat message. Rows are append-only and ordered by
/// `created_at`; this subsystem never edits or deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_kind: ActorKind,
    pub receiver_id: Uuid,
    pub receiver_kind: ActorKind,
    pub text: String,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The one thread between a patient and a doctor. A unique constraint on
/// `(patient_id, doctor_id)` guarantees a single row per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_unread_count: i64,
    pub doctor_unread_count: i64,
    pub last_message_text: Option<String>,
    pub last_message_sender_id: Option<Uuid>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn involves(&self, actor_id: Uuid) -> bool {
        self.patient_id == actor_id || self.doctor_id == actor_id
    }

    /// The other participant, when `actor_id` is one of the two.
    pub fn peer_of(&self, actor_id: Uuid) -> Option<ActorRef> {
        if actor_id == self.patient_id {
            Some(ActorRef {
                id: self.doctor_id,
                kind: ActorKind::Doctor,
            })
        } else if actor_id == self.doctor_id {
            Some(ActorRef {
                id: self.patient_id,
                kind: ActorKind::Patient,
            })
        } else {
            None
        }
    }

    pub fn unread_count_for(&self, actor_id: Uuid) -> Option<i64> {
        if actor_id == self.patient_id {
            Some(self.patient_unread_count)
        } else if actor_id == self.doctor_id {
            Some(self.doctor_unread_count)
        } else {
            None
        }
    }
}

/// Client-to-server events on the chat socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    Identify { actor_id: Uuid, kind: ActorKind },
    SendMessage { receiver_id: Uuid, text: String },
    GetHistory { conversation_id: Uuid },
    GetConversations,
    MarkRead { conversation_id: Uuid },
}

/// Server-to-client events on the chat socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    PresenceChanged {
        actor_id: Uuid,
        is_online: bool,
    },
    NewMessage {
        conversation_id: Uuid,
        message: Message,
    },
    /// Receiver-directed ping that a message arrived; best-effort only.
    MessageNotification {
        conversation_id: Uuid,
        message: Message,
    },
    ChatHistory {
        conversation_id: Uuid,
        messages: Vec<Message>,
    },
    UserConversations {
        conversations: Vec<Conversation>,
    },
    MessagesRead {
        conversation_id: Uuid,
        reader_id: Uuid,
    },
    MessagesMarkedRead {
        conversation_id: Uuid,
    },
    /// Sent to a connection evicted by a newer login for the same actor.
    SessionReplaced,
    Error {
        message: String,
    },
}
