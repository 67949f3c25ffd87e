use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a stored or submitted enum string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Enums persisted as lowercase TEXT columns share this string mapping.
macro_rules! text_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $label, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostCategory {
    News,
    Entertainment,
    Discussion,
    Media,
}

text_enum!(PostCategory, "post category", {
    News => "news",
    Entertainment => "entertainment",
    Discussion => "discussion",
    Media => "media",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

text_enum!(ReactionKind, "reaction kind", {
    Like => "like",
    Dislike => "dislike",
});

impl ReactionKind {
    /// Karma granted to the content author while this reaction stands.
    pub fn karma(&self) -> i64 {
        match self {
            ReactionKind::Like => 1,
            ReactionKind::Dislike => -1,
        }
    }
}

/// Ordered so that `Owner > Moderator > Member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunityRole {
    Member,
    Moderator,
    Owner,
}

text_enum!(CommunityRole, "community role", {
    Member => "member",
    Moderator => "moderator",
    Owner => "owner",
});

impl CommunityRole {
    pub fn is_staff(&self) -> bool {
        *self >= CommunityRole::Moderator
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportTarget {
    Post,
    Comment,
    Discussion,
}

text_enum!(ReportTarget, "report target", {
    Post => "post",
    Comment => "comment",
    Discussion => "discussion",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Rejected,
}

text_enum!(ReportStatus, "report status", {
    Pending => "pending",
    Resolved => "resolved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewComment,
    NewReply,
    NewFollower,
    NewReaction,
    Banned,
    ReportResolved,
}

text_enum!(NotificationKind, "notification kind", {
    NewComment => "new_comment",
    NewReply => "new_reply",
    NewFollower => "new_follower",
    NewReaction => "new_reaction",
    Banned => "banned",
    ReportResolved => "report_resolved",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Image,
    Video,
}

text_enum!(UploadKind, "upload kind", {
    Image => "image",
    Video => "video",
});
