use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;
use serde::Deserialize;

// Domain data structures shared across modules.

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    /// Set locally once the user asked to see fewer notifications like this one.
    #[serde(skip)]
    pub demoted: bool,
    #[serde(default)]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub post: Option<PostRef>,
    #[serde(default, rename = "Comment")]
    pub comment: Option<CommentRef>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "Like")]
    pub like: Option<LikeRef>,
    #[serde(default, rename = "Bookmark")]
    pub bookmark: Option<BookmarkRef>,
}

impl NotificationRecord {
    pub fn time_ago(&self, now: DateTime<Utc>) -> String {
        HumanTime::from(self.created_at - now).to_string()
    }

    /// Id of the comment, like, bookmark or post the notification points at.
    pub fn reference_id(&self) -> Option<&str> {
        self.comment
            .as_ref()
            .map(|comment| comment.id.as_str())
            .or(self.like.as_ref().map(|like| like.id.as_str()))
            .or(self.bookmark.as_ref().map(|bookmark| bookmark.id.as_str()))
            .or(self.post.as_ref().map(|post| post.id.as_str()))
    }

    pub fn summary(&self) -> String {
        let who = self
            .sender
            .as_ref()
            .map(Sender::display_name)
            .unwrap_or_else(|| "Someone".to_owned());
        let post_title = self
            .post
            .as_ref()
            .and_then(PostRef::headline)
            .map(|title| format!(" \"{title}\""))
            .unwrap_or_default();

        match self.kind {
            NotificationKind::Mention => match self.content.as_deref() {
                Some(text) if !text.trim().is_empty() => {
                    format!("{who} mentioned you: {}", text.trim())
                }
                _ => format!("{who} mentioned you in a post"),
            },
            NotificationKind::Like => format!("{who} liked your post{post_title}"),
            NotificationKind::Comment => match self
                .comment
                .as_ref()
                .and_then(|comment| comment.content.as_deref())
            {
                Some(text) => format!("{who} commented on your post: {}", text.trim()),
                None => format!("{who} commented on your post{post_title}"),
            },
            NotificationKind::Follow => format!("{who} started following you"),
            NotificationKind::Bookmark => format!("{who} bookmarked your post{post_title}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Mention,
    Like,
    Comment,
    Follow,
    Bookmark,
}

impl NotificationKind {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationKind::Mention => "Mention",
            NotificationKind::Like => "Like",
            NotificationKind::Comment => "Comment",
            NotificationKind::Follow => "Follow",
            NotificationKind::Bookmark => "Bookmark",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Sender {
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        match self.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("@{name}"),
            _ => "Someone".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct PostRef {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl PostRef {
    const HEADLINE_CHARS: usize = 48;

    /// Title when present, otherwise the start of the post body.
    fn headline(&self) -> Option<String> {
        let source = self
            .title
            .as_deref()
            .or(self.content.as_deref())?
            .trim();
        if source.is_empty() {
            return None;
        }
        if source.chars().count() <= Self::HEADLINE_CHARS {
            return Some(source.to_owned());
        }
        let cut: String = source.chars().take(Self::HEADLINE_CHARS).collect();
        Some(format!("{}…", cut.trim_end()))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CommentRef {
    pub id: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LikeRef {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BookmarkRef {
    pub id: String,
}

/// Server-side filter applied to one notification tab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    All,
    Mentions,
    Following,
}

impl Category {
    pub const TABS: [Category; 3] = [Category::All, Category::Mentions, Category::Following];

    pub fn label(&self) -> &'static str {
        match self {
            Category::All => "All",
            Category::Mentions => "Mentions",
            Category::Following => "Following",
        }
    }

    pub fn filter(&self) -> Option<&'static str> {
        match self {
            Category::All => None,
            Category::Mentions => Some("MENTION"),
            Category::Following => Some("FOLLOW"),
        }
    }

    pub fn empty_text(&self) -> &'static str {
        match self {
            Category::All => "You don't have any notifications yet.",
            Category::Mentions => "You don't have any mentions yet.",
            Category::Following => "No activity from people you follow yet.",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            Category::All => "notifications",
            Category::Mentions => "mentions",
            Category::Following => "following activity",
        }
    }
}
