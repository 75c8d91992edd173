use crate::retry::{classify_failure, failure_error, ForumRetryConfig, RetryState, RetryStrategy};
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use starwatch_core::{
    BotConfig, Comment, ConfigError, CoreError, ForumApiError, Post, PostId,
};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

pub const DEFAULT_FORUM_API_BASE: &str = "https://prod-api.lolz.live";

/// Sort order requested from the thread listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOrder {
    /// Newest posts on the first page
    NewestFirst,
    /// Server default, oldest first
    Chronological,
}

impl PostOrder {
    pub fn as_param(&self) -> Option<&'static str> {
        match self {
            PostOrder::NewestFirst => Some("post_date_reverse"),
            PostOrder::Chronological => None,
        }
    }
}

/// Posts are decoded one by one so a single malformed entry cannot sink the
/// whole page.
#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    posts: Vec<serde_json::Value>,
}

impl PostsResponse {
    fn into_posts(self) -> Vec<Post> {
        self.posts
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| match serde_json::from_value::<Post>(raw) {
                Ok(post) => Some(post),
                Err(e) => {
                    warn!("Dropping malformed post at position {} of the page: {}", index, e);
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CommentsResponse {
    #[serde(default)]
    comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
struct CreatedCommentResponse {
    #[serde(default)]
    comment: Option<Comment>,
}

#[derive(Debug, Serialize)]
struct CreateCommentRequest<'a> {
    comment_body: &'a str,
}

/// The forum operations the monitor depends on.
#[async_trait]
pub trait ForumApi: Send + Sync {
    async fn fetch_posts_page(
        &self,
        thread_id: &str,
        page: u32,
        order: PostOrder,
    ) -> Result<Vec<Post>, CoreError>;

    async fn fetch_post_comments(&self, post_id: PostId) -> Result<Vec<Comment>, CoreError>;

    async fn create_comment(&self, post_id: PostId, body: &str) -> Result<Comment, CoreError>;

    /// Whether the post already has discussion comments. A failed lookup
    /// counts as "no comments".
    async fn has_comments(&self, post_id: PostId) -> bool {
        match self.fetch_post_comments(post_id).await {
            Ok(comments) => !comments.is_empty(),
            Err(e) => {
                warn!("Could not fetch comments for post {}: {}", post_id, e);
                false
            }
        }
    }

    /// Walk thread pages from `start_page` until an empty page, a failed
    /// page, or `max_pages` pages have been read.
    async fn fetch_thread_posts(
        &self,
        thread_id: &str,
        start_page: u32,
        order: PostOrder,
        max_pages: Option<u32>,
        page_delay: Duration,
    ) -> Vec<Post> {
        let mut all_posts = Vec::new();
        let mut page = start_page.max(1);
        let mut pages_read = 0u32;

        loop {
            if max_pages.is_some_and(|max| pages_read >= max) {
                break;
            }

            let posts = match self.fetch_posts_page(thread_id, page, order).await {
                Ok(posts) => posts,
                Err(e) => {
                    warn!(
                        "Stopping page walk of thread {} at page {}: {}",
                        thread_id, page, e
                    );
                    break;
                }
            };

            if posts.is_empty() {
                break;
            }

            info!(
                "Fetched {} posts from thread {} page {}",
                posts.len(),
                thread_id,
                page
            );
            all_posts.extend(posts);
            pages_read += 1;
            page += 1;

            if max_pages.map_or(true, |max| pages_read < max) && !page_delay.is_zero() {
                sleep(page_delay).await;
            }
        }

        if all_posts.is_empty() {
            info!("No posts found in thread {}", thread_id);
        } else {
            debug!("Fetched {} posts from thread {} in total", all_posts.len(), thread_id);
        }
        all_posts
    }
}

#[derive(Debug)]
pub struct ForumApiClient {
    http_client: Client,
    base_url: Url,
    token: String,
    retry: ForumRetryConfig,
}

impl ForumApiClient {
    pub fn new(
        base_url: &str,
        token: String,
        timeout: Duration,
        retry: ForumRetryConfig,
    ) -> Result<Self, CoreError> {
        let mut base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            field: "forum_base_url".to_string(),
            value: format!("{base_url} ({e})"),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url,
            token,
            retry,
        })
    }

    pub fn from_config(config: &BotConfig) -> Result<Self, CoreError> {
        Self::new(
            &config.forum_base_url,
            config.forum_token.clone(),
            config.request_timeout(),
            ForumRetryConfig::with_flood_marker(config.forum_flood_marker.clone()),
        )
    }

    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, CoreError> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| CoreError::InvalidInput {
                message: format!("Invalid endpoint {endpoint}: {e}"),
            })
    }

    /// Send a request, repeating it once when the forum signals flood
    /// control and backing off on HTTP 429.
    pub async fn make_request<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        endpoint: &str,
        query_params: Option<&[(&str, String)]>,
        body: Option<&B>,
    ) -> Result<Response, CoreError> {
        let url = self.endpoint_url(endpoint)?;
        let mut state = RetryState::Fresh;

        loop {
            let mut request_builder = self
                .http_client
                .request(method.clone(), url.clone())
                .bearer_auth(&self.token);

            if let Some(params) = query_params {
                request_builder = request_builder.query(params);
            }
            if let Some(body) = body {
                request_builder = request_builder.json(body);
            }

            debug!("Making forum API request: {} {}", method, endpoint);
            let response = match request_builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    error!("Network error for {} {}: {}", method, endpoint, e);
                    if e.is_timeout() {
                        return Err(ForumApiError::RequestTimeout.into());
                    }
                    return Err(CoreError::Network(e));
                }
            };

            let status = response.status();
            if status.is_success() {
                debug!("Request successful: {} {}", status, endpoint);
                return Ok(response);
            }

            let status_code = status.as_u16();
            let body_text = response.text().await.unwrap_or_default();

            match classify_failure(status_code, &body_text, state, &self.retry) {
                RetryStrategy::RetryAfter(delay) => {
                    warn!(
                        "Forum flood control on {}, repeating in {:?}",
                        endpoint, delay
                    );
                    sleep(delay).await;
                    state = RetryState::Retried;
                }
                RetryStrategy::BackoffThenFail(delay) => {
                    warn!("Forum rate limit hit on {}, waiting {:?}", endpoint, delay);
                    sleep(delay).await;
                    return Err(failure_error(status_code, &body_text, endpoint, &self.retry).into());
                }
                RetryStrategy::NoRetry => {
                    error!(
                        "Forum API error {} for {}: {}",
                        status_code, endpoint, body_text
                    );
                    return Err(failure_error(status_code, &body_text, endpoint, &self.retry).into());
                }
            }
        }
    }

    async fn parse_json<T: for<'de> Deserialize<'de>>(
        response: Response,
        what: &str,
    ) -> Result<T, CoreError> {
        response.json().await.map_err(|e| {
            error!("Failed to parse {}: {}", what, e);
            ForumApiError::InvalidResponse {
                details: format!("Failed to parse {what}"),
            }
            .into()
        })
    }
}

#[async_trait]
impl ForumApi for ForumApiClient {
    async fn fetch_posts_page(
        &self,
        thread_id: &str,
        page: u32,
        order: PostOrder,
    ) -> Result<Vec<Post>, CoreError> {
        let mut params = vec![("thread_id", thread_id.to_string()), ("page", page.to_string())];
        if let Some(order) = order.as_param() {
            params.push(("order", order.to_string()));
        }

        let response = self
            .make_request::<()>(Method::GET, "/posts", Some(params.as_slice()), None)
            .await?;
        let listing: PostsResponse = Self::parse_json(response, "thread posts").await?;
        let posts = listing.into_posts();

        debug!(
            "Retrieved {} posts from thread {} page {}",
            posts.len(),
            thread_id,
            page
        );
        Ok(posts)
    }

    async fn fetch_post_comments(&self, post_id: PostId) -> Result<Vec<Comment>, CoreError> {
        let params = [("post_id", post_id.to_string())];
        let response = self
            .make_request::<()>(Method::GET, "/posts/comments", Some(&params[..]), None)
            .await?;
        let listing: CommentsResponse = Self::parse_json(response, "post comments").await?;
        Ok(listing.comments)
    }

    async fn create_comment(&self, post_id: PostId, body: &str) -> Result<Comment, CoreError> {
        let endpoint = format!("/posts/{post_id}/comments");
        let payload = CreateCommentRequest { comment_body: body };

        info!("Posting comment to post {}", post_id);
        let response = self
            .make_request(Method::POST, &endpoint, None, Some(&payload))
            .await?;
        let created: CreatedCommentResponse = Self::parse_json(response, "created comment").await?;

        created.comment.ok_or_else(|| {
            ForumApiError::InvalidResponse {
                details: format!("No comment returned for post {post_id}"),
            }
            .into()
        })
    }
}
