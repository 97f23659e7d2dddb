//! Slack Web API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, trace};

use crate::{ErrorReason, MembersPage, Messenger, MessagingError, RepliesPage, Reply};

/// Default Slack Web API endpoint.
pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// Page size for paginated listing calls.
const PAGE_LIMIT: &str = "200";

/// Identity of the bot token, as reported by `auth.test`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthInfo {
    pub user_id: String,
    pub team_id: String,
    #[serde(default)]
    pub team: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

impl ResponseMetadata {
    fn into_cursor(self) -> Option<String> {
        Some(self.next_cursor).filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ts: String,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    #[serde(default)]
    user: Option<String>,
    ts: String,
}

#[derive(Debug, Deserialize)]
struct RepliesResponse {
    #[serde(default)]
    messages: Vec<ThreadMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    real_name: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    name: String,
    #[serde(default)]
    profile: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    user: UserInfo,
}

/// Client for one workspace's bot token.
pub struct SlackClient {
    http: Client,
    base_url: String,
    token: String,
}

impl SlackClient {
    /// Create a client against the public Slack API.
    pub fn new(token: impl Into<String>) -> Result<Self, MessagingError> {
        Self::with_base_url(token, DEFAULT_API_URL)
    }

    /// Create a client against a custom API root.
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, MessagingError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Check the token and report who it belongs to.
    pub async fn auth_test(&self) -> Result<AuthInfo, MessagingError> {
        self.call("auth.test", &[]).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<T, MessagingError> {
        let url = format!("{}/{}", self.base_url, method);
        trace!(%method, "calling Slack API");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .form(params)
            .send()
            .await?;

        self.handle_response(method, response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, MessagingError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(MessagingError::transient(format!(
                "{} failed ({})",
                method, status
            )));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MessagingError::new(
                ErrorReason::Other,
                format!("{} failed ({}): {}", method, status, text),
            ));
        }

        let body: serde_json::Value = response.json().await?;
        if body.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let code = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown_error");
            debug!(%method, error = %code, "Slack API returned an error");
            return Err(MessagingError::api(code));
        }

        serde_json::from_value(body).map_err(|e| {
            MessagingError::new(
                ErrorReason::Other,
                format!("invalid {} response: {}", method, e),
            )
        })
    }
}

#[async_trait]
impl Messenger for SlackClient {
    async fn post_message(&self, channel: &str, text: &str) -> Result<String, MessagingError> {
        let response: PostMessageResponse = self
            .call("chat.postMessage", &[("channel", channel), ("text", text)])
            .await?;
        Ok(response.ts)
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), MessagingError> {
        let _: serde_json::Value = self
            .call(
                "chat.update",
                &[("channel", channel), ("ts", ts), ("text", text)],
            )
            .await?;
        Ok(())
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), MessagingError> {
        let mut params = vec![("channel", channel), ("user", user), ("text", text)];
        if let Some(thread_ts) = thread_ts {
            params.push(("thread_ts", thread_ts));
        }
        let _: serde_json::Value = self.call("chat.postEphemeral", &params).await?;
        Ok(())
    }

    async fn list_replies(
        &self,
        channel: &str,
        thread_ts: &str,
        oldest: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<RepliesPage, MessagingError> {
        let mut params = vec![("channel", channel), ("ts", thread_ts), ("limit", PAGE_LIMIT)];
        if let Some(oldest) = oldest {
            params.push(("oldest", oldest));
        }
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let response: RepliesResponse = self.call("conversations.replies", &params).await?;

        // The parent message is always returned alongside its replies
        let replies = response
            .messages
            .into_iter()
            .filter(|m| m.ts != thread_ts)
            .filter_map(|m| m.user.map(|user| Reply { user, ts: m.ts }))
            .collect();

        Ok(RepliesPage {
            replies,
            has_more: response.has_more,
            next_cursor: response.response_metadata.into_cursor(),
        })
    }

    async fn channel_members_page(
        &self,
        channel: &str,
        cursor: Option<&str>,
    ) -> Result<MembersPage, MessagingError> {
        let mut params = vec![("channel", channel), ("limit", PAGE_LIMIT)];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let response: MembersResponse = self.call("conversations.members", &params).await?;
        Ok(MembersPage {
            members: response.members,
            next_cursor: response.response_metadata.into_cursor(),
        })
    }

    async fn display_name(&self, user: &str) -> Result<String, MessagingError> {
        let response: UserInfoResponse = self.call("users.info", &[("user", user)]).await?;
        let info = response.user;

        let name = info
            .profile
            .and_then(|p| {
                [p.display_name, p.real_name]
                    .into_iter()
                    .find(|n| !n.is_empty())
            })
            .unwrap_or(info.name);
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> SlackClient {
        SlackClient::with_base_url("xoxb-test", server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_post_message_returns_ts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_string_contains("channel=C1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "channel": "C1",
                "ts": "1700000000.000100"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ts = client(&server).await.post_message("C1", "hello").await.unwrap();
        assert_eq!(ts, "1700000000.000100");
    }

    #[tokio::test]
    async fn test_api_error_maps_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.update"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": false, "error": "not_in_channel" })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .update_message("C1", "1.000001", "hi")
            .await
            .unwrap_err();
        assert_eq!(err.reason, ErrorReason::NotInChannel);
        assert!(err.is_access_lost());
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .post_message("C1", "hi")
            .await
            .unwrap_err();
        assert_eq!(err.reason, ErrorReason::Transient);
    }

    #[tokio::test]
    async fn test_list_replies_skips_parent_and_bots() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations.replies"))
            .and(body_string_contains("oldest=100.000002"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [
                    { "user": "UBOT", "ts": "100.000001", "thread_ts": "100.000001" },
                    { "user": "U1", "ts": "100.000003", "thread_ts": "100.000001" },
                    { "bot_id": "B1", "ts": "100.000004", "thread_ts": "100.000001" }
                ],
                "has_more": true,
                "response_metadata": { "next_cursor": "abc" }
            })))
            .mount(&server)
            .await;

        let page = client(&server)
            .await
            .list_replies("C1", "100.000001", Some("100.000002"), None)
            .await
            .unwrap();

        assert_eq!(
            page,
            RepliesPage {
                replies: vec![Reply {
                    user: "U1".to_string(),
                    ts: "100.000003".to_string(),
                }],
                has_more: true,
                next_cursor: Some("abc".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_list_channel_members_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations.members"))
            .and(body_string_contains("cursor=next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": ["U3"],
                "response_metadata": { "next_cursor": "" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations.members"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": ["U1", "U2"],
                "response_metadata": { "next_cursor": "next" }
            })))
            .mount(&server)
            .await;

        let members = client(&server)
            .await
            .list_channel_members("C1")
            .await
            .unwrap();
        assert_eq!(members, vec!["U1", "U2", "U3"]);
    }

    #[tokio::test]
    async fn test_display_name_prefers_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users.info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user": {
                    "name": "jdoe",
                    "profile": { "display_name": "", "real_name": "Jo Doe" }
                }
            })))
            .mount(&server)
            .await;

        let name = client(&server).await.display_name("U1").await.unwrap();
        assert_eq!(name, "Jo Doe");
    }

    #[tokio::test]
    async fn test_auth_test() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user_id": "UBOT",
                "team_id": "T1",
                "team": "Acme"
            })))
            .mount(&server)
            .await;

        let info = client(&server).await.auth_test().await.unwrap();
        assert_eq!(info.user_id, "UBOT");
        assert_eq!(info.team_id, "T1");
    }
}
