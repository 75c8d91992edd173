use serde::{Deserialize, Serialize};

pub type PostId = u64;
pub type UserId = u64;

/// A forum post as returned by the thread listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub post_id: Option<PostId>,
    #[serde(default)]
    pub poster_user_id: Option<UserId>,
    #[serde(default)]
    pub poster_username: Option<String>,
    #[serde(default)]
    pub post_body: Option<String>,
    #[serde(default)]
    pub post_body_html: Option<String>,
    #[serde(default)]
    pub post_comment_count: Option<u32>,
}

impl Post {
    /// Rendered HTML body when present and non-empty, otherwise the plain body.
    pub fn content(&self) -> Option<&str> {
        self.post_body_html
            .as_deref()
            .filter(|body| !body.is_empty())
            .or_else(|| self.post_body.as_deref().filter(|body| !body.is_empty()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub comment_id: Option<u64>,
    #[serde(default)]
    pub post_id: Option<PostId>,
    #[serde(default)]
    pub comment_body: Option<String>,
}
