//! Per-post pipeline: dedupe, comment check, link extraction, reactions and
//! the acknowledgement reply.

use forum_client::ForumApi;
use ledger::ProcessedLedger;
use messaging_client::ReactionSender;
use starwatch_core::{extract_links, parse_link, BotConfig, ErrorExt, Post, PostId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub skip_posts_with_comments: bool,
    pub enable_reply: bool,
    pub reply_templates: Vec<String>,
    pub mention_author: bool,
    pub reply_delay: Duration,
    pub reaction_spacing: Duration,
}

impl ProcessorSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            skip_posts_with_comments: config.skip_posts_with_comments,
            enable_reply: config.enable_reply,
            reply_templates: config.reply_templates.clone(),
            mention_author: config.mention_author,
            reply_delay: config.reply_delay(),
            reaction_spacing: config.reaction_spacing(),
        }
    }
}

/// What happened to a single post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// No id, or already in the ledger. Nothing was touched.
    Ignored,
    SkippedHasComments,
    SkippedNoContent,
    SkippedNoLinks,
    Completed {
        links: usize,
        reactions_sent: usize,
        replied: bool,
    },
}

pub struct PostProcessor {
    forum: Arc<dyn ForumApi>,
    reactions: ReactionSender,
    ledger: ProcessedLedger,
    settings: ProcessorSettings,
}

impl PostProcessor {
    pub fn new(
        forum: Arc<dyn ForumApi>,
        reactions: ReactionSender,
        ledger: ProcessedLedger,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            forum,
            reactions,
            ledger,
            settings,
        }
    }

    pub fn ledger(&self) -> &ProcessedLedger {
        &self.ledger
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Handle one post. Failures are logged, never returned: once a post has
    /// been attempted it is recorded in the ledger.
    pub async fn process(&mut self, post: &Post) -> PostOutcome {
        let post_id = match post.post_id {
            Some(id) if !self.ledger.is_processed(id) => id,
            _ => return PostOutcome::Ignored,
        };

        info!("Processing new post {}", post_id);
        let outcome = self.handle(post_id, post).await;
        self.finish(post_id);
        outcome
    }

    async fn handle(&self, post_id: PostId, post: &Post) -> PostOutcome {
        if self.settings.skip_posts_with_comments && self.forum.has_comments(post_id).await {
            info!("Post {} already has comments, skipping", post_id);
            return PostOutcome::SkippedHasComments;
        }

        let Some(content) = post.content() else {
            warn!("Post {} has no content, skipping", post_id);
            return PostOutcome::SkippedNoContent;
        };

        let links = extract_links(content);
        if links.is_empty() {
            info!("No messaging links in post {}", post_id);
            return PostOutcome::SkippedNoLinks;
        }
        debug!("Post {} links: {:?}", post_id, links);

        let mut reactions_sent = 0;
        for link in &links {
            let Some(target) = parse_link(link) else {
                warn!("Could not parse link {} in post {}", link, post_id);
                continue;
            };
            if self.reactions.send(&target).await {
                reactions_sent += 1;
            }
            sleep(self.settings.reaction_spacing).await;
        }

        let replied = reactions_sent > 0
            && self.settings.enable_reply
            && self.reply(post_id, post.poster_user_id).await;

        PostOutcome::Completed {
            links: links.len(),
            reactions_sent,
            replied,
        }
    }

    async fn reply(&self, post_id: PostId, author: Option<UserId>) -> bool {
        let Some(template) = pick_template(&self.settings.reply_templates) else {
            warn!("No reply templates configured, not replying to post {}", post_id);
            return false;
        };

        sleep(self.settings.reply_delay).await;

        let body = match author {
            Some(user_id) if self.settings.mention_author => mention(user_id, template),
            _ => template.to_string(),
        };

        match self.forum.create_comment(post_id, &body).await {
            Ok(_) => {
                info!(outcome = "success", "Replied to post {}", post_id);
                true
            }
            Err(e) => {
                e.log_warn();
                false
            }
        }
    }

    fn finish(&mut self, post_id: PostId) {
        match self.ledger.mark_processed(post_id) {
            Ok(_) => info!("Post {} done", post_id),
            Err(e) => {
                e.log_error();
            }
        }
    }
}

fn pick_template(templates: &[String]) -> Option<&str> {
    if templates.is_empty() {
        return None;
    }
    Some(templates[fastrand::usize(..templates.len())].as_str())
}

/// Wrap `message` in the forum's mention directive for `user_id`.
pub fn mention(user_id: UserId, message: &str) -> String {
    format!("[userids={user_id};align=left]{message}[/userids]")
}
