use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{CommentResponse, MessageResponse, NotificationResponse, PostResponse, UserSummary};

/// Events pushed over the `/ws` gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    NewPost { post: PostResponse },

    PostDeleted {
        post_id: Uuid,
        community_id: Option<Uuid>,
    },

    NewComment {
        comment: CommentResponse,
        community_id: Option<Uuid>,
    },

    CommentDeleted {
        comment_id: Uuid,
        post_id: Uuid,
        community_id: Option<Uuid>,
    },

    /// Reaction totals on a post changed
    ReactionUpdate {
        post_id: Uuid,
        community_id: Option<Uuid>,
        likes: u64,
        dislikes: u64,
    },

    NewFollower { follower: UserSummary },

    NewMessage {
        message: MessageResponse,
        sender_username: String,
    },

    /// A conversation partner is typing
    Typing { user_id: Uuid, username: String },

    Notification { notification: NotificationResponse },

    /// The receiving user was banned from a community
    Banned {
        community_id: Uuid,
        community_slug: String,
        reason: String,
    },

    PresenceUpdate {
        user_id: Uuid,
        username: String,
        online: bool,
    },
}

impl ServerEvent {
    /// Returns the community this event is scoped to.
    /// Events that return `None` go to every connected client.
    pub fn community_id(&self) -> Option<Uuid> {
        match self {
            Self::NewPost { post } => post.community_id,
            Self::PostDeleted { community_id, .. }
            | Self::NewComment { community_id, .. }
            | Self::CommentDeleted { community_id, .. }
            | Self::ReactionUpdate { community_id, .. } => *community_id,
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Authenticate a connection that did not present a token at upgrade time
    Identify { token: String },

    /// Receive community-scoped events for these communities only.
    /// Replaces any previous subscription set.
    Subscribe { community_ids: Vec<Uuid> },

    /// Tell a direct-message partner that we are typing
    Typing { recipient_id: Uuid },
}
