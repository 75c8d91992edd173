#[cfg(test)]
mod tests {
    use crate::{ForumApi, ForumApiClient, ForumRetryConfig, PostOrder};
    use async_trait::async_trait;
    use starwatch_core::{Comment, CoreError, ForumApiError, Post, PostId};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves canned pages and records which pages were requested.
    struct PagedForum {
        pages: Vec<Result<Vec<Post>, ForumApiError>>,
        comments: Result<Vec<Comment>, ForumApiError>,
        requested: Mutex<Vec<(u32, PostOrder)>>,
    }

    impl PagedForum {
        fn new(pages: Vec<Result<Vec<Post>, ForumApiError>>) -> Self {
            Self {
                pages,
                comments: Ok(Vec::new()),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested_pages(&self) -> Vec<u32> {
            self.requested.lock().unwrap().iter().map(|(p, _)| *p).collect()
        }
    }

    fn posts(ids: &[u64]) -> Vec<Post> {
        ids.iter()
            .map(|id| Post {
                post_id: Some(*id),
                ..Default::default()
            })
            .collect()
    }

    #[async_trait]
    impl ForumApi for PagedForum {
        async fn fetch_posts_page(
            &self,
            _thread_id: &str,
            page: u32,
            order: PostOrder,
        ) -> Result<Vec<Post>, CoreError> {
            self.requested.lock().unwrap().push((page, order));
            match self.pages.get(page as usize - 1) {
                Some(Ok(posts)) => Ok(posts.clone()),
                Some(Err(e)) => Err(e.clone().into()),
                None => Ok(Vec::new()),
            }
        }

        async fn fetch_post_comments(&self, _post_id: PostId) -> Result<Vec<Comment>, CoreError> {
            self.comments.clone().map_err(Into::into)
        }

        async fn create_comment(&self, post_id: PostId, body: &str) -> Result<Comment, CoreError> {
            Ok(Comment {
                comment_id: Some(1),
                post_id: Some(post_id),
                comment_body: Some(body.to_string()),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_walks_pages_until_empty() {
        let forum = PagedForum::new(vec![Ok(posts(&[1, 2])), Ok(posts(&[3])), Ok(Vec::new())]);

        let all = forum
            .fetch_thread_posts("10", 1, PostOrder::Chronological, None, Duration::from_secs(1))
            .await;

        let ids: Vec<_> = all.iter().filter_map(|p| p.post_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(forum.requested_pages(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_respects_start_page_and_page_cap() {
        let forum = PagedForum::new(vec![Ok(posts(&[1])), Ok(posts(&[2])), Ok(posts(&[3]))]);

        let all = forum
            .fetch_thread_posts("10", 2, PostOrder::NewestFirst, Some(1), Duration::ZERO)
            .await;

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].post_id, Some(2));
        let requested = forum.requested.lock().unwrap().clone();
        assert_eq!(requested, vec![(2, PostOrder::NewestFirst)]);
    }

    #[tokio::test]
    async fn test_failed_page_ends_walk_with_collected_posts() {
        let forum = PagedForum::new(vec![
            Ok(posts(&[1, 2])),
            Err(ForumApiError::ServerError { status_code: 502 }),
            Ok(posts(&[3])),
        ]);

        let all = forum
            .fetch_thread_posts("10", 1, PostOrder::Chronological, None, Duration::ZERO)
            .await;

        assert_eq!(all.len(), 2);
        assert_eq!(forum.requested_pages(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failed_first_page_means_no_data() {
        let forum = PagedForum::new(vec![Err(ForumApiError::RequestTimeout)]);

        let all = forum
            .fetch_thread_posts("10", 1, PostOrder::NewestFirst, Some(1), Duration::ZERO)
            .await;

        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_has_comments() {
        let mut forum = PagedForum::new(Vec::new());
        assert!(!forum.has_comments(5).await);

        forum.comments = Ok(vec![Comment::default()]);
        assert!(forum.has_comments(5).await);

        forum.comments = Err(ForumApiError::RequestTimeout);
        assert!(!forum.has_comments(5).await);
    }

    const FLOOD_BODY: &str = r#"{"errors":["Необходимо подождать 3 секунды"]}"#;
    const ONE_POST: &str = r#"{"posts":[{"post_id":7,"post_body":"hi"}]}"#;

    /// Minimal HTTP server answering one scripted response per connection.
    /// Returns its base URL and the request heads it received.
    async fn scripted_server(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };

                let request = read_request(&mut socket).await;
                seen.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (base_url, requests)
    }

    /// Read the head and any `content-length` body so closing the socket
    /// does not reset the connection under the client.
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&data[..end]).to_string();
                let body_len = head
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + body_len {
                    return String::from_utf8_lossy(&data).to_string();
                }
            }
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return String::from_utf8_lossy(&data).to_string(),
                Ok(n) => data.extend_from_slice(&buf[..n]),
            }
        }
    }

    fn fast_retry() -> ForumRetryConfig {
        ForumRetryConfig {
            flood_backoff: Duration::from_millis(50),
            rate_limit_backoff: Duration::from_millis(80),
            ..Default::default()
        }
    }

    fn http_client(base_url: &str) -> ForumApiClient {
        ForumApiClient::new(base_url, "token".to_string(), Duration::from_secs(5), fast_retry()).unwrap()
    }

    #[tokio::test]
    async fn test_flood_control_is_repeated_once() {
        let (base_url, requests) = scripted_server(vec![(403, FLOOD_BODY), (200, ONE_POST)]).await;
        let client = http_client(&base_url);

        let started = Instant::now();
        let posts = client
            .fetch_posts_page("55", 2, PostOrder::NewestFirst)
            .await
            .unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post_id, Some(7));
        assert!(started.elapsed() >= Duration::from_millis(50));

        let requests = requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);
        let first = requests[0].to_lowercase();
        assert!(first.starts_with("get /posts?"));
        assert!(first.contains("thread_id=55"));
        assert!(first.contains("order=post_date_reverse"));
        assert!(first.contains("authorization: bearer token"));
    }

    #[tokio::test]
    async fn test_second_flood_response_fails() {
        let (base_url, requests) =
            scripted_server(vec![(403, FLOOD_BODY), (403, FLOOD_BODY), (200, ONE_POST)]).await;
        let client = http_client(&base_url);

        let result = client.fetch_posts_page("55", 1, PostOrder::NewestFirst).await;

        assert!(matches!(
            result,
            Err(CoreError::ForumApi(ForumApiError::FloodControl { .. }))
        ));
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_backs_off_then_fails() {
        let (base_url, requests) = scripted_server(vec![(429, "{}"), (200, ONE_POST)]).await;
        let client = http_client(&base_url);

        let started = Instant::now();
        let result = client.fetch_post_comments(7).await;

        assert!(matches!(
            result,
            Err(CoreError::ForumApi(ForumApiError::RateLimitExceeded { .. }))
        ));
        assert!(started.elapsed() >= Duration::from_millis(80));
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_plain_forbidden_is_not_repeated() {
        let (base_url, requests) =
            scripted_server(vec![(403, r#"{"errors":["no access"]}"#), (200, ONE_POST)]).await;
        let client = http_client(&base_url);

        let result = client.fetch_posts_page("55", 1, PostOrder::Chronological).await;

        assert!(matches!(
            result,
            Err(CoreError::ForumApi(ForumApiError::Forbidden { .. }))
        ));
        let requests = requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].contains("order="));
    }

    #[tokio::test]
    async fn test_comment_is_posted_as_json() {
        let (base_url, requests) =
            scripted_server(vec![(200, r#"{"comment":{"comment_id":11,"post_id":7}}"#)]).await;
        let client = http_client(&base_url);

        let comment = client.create_comment(7, "Done").await.unwrap();

        assert_eq!(comment.comment_id, Some(11));
        let requests = requests.lock().unwrap().clone();
        assert!(requests[0].starts_with("POST /posts/7/comments"));
        assert!(requests[0].ends_with(r#"{"comment_body":"Done"}"#));
    }
}
