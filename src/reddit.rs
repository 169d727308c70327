//! Reddit gateway
//!
//! Concrete [`ItemGateway`] implementation over the Reddit OAuth API, plus
//! the wiki and new-listing endpoints the bootstrap and feed need. Uses a
//! script-app password grant; every request carries a bounded timeout so a
//! stalled call cannot pin a run forever.

use crate::feed::ItemSource;
use crate::gateway::{CommentId, GatewayError, ItemGateway, ItemId, ItemSnapshot, SentMessage};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Script-app credentials, read from the environment by the bootstrap.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

/// Authenticated Reddit API client scoped to one subreddit.
pub struct RedditGateway {
    client: reqwest::Client,
    // TODO: refresh the bearer token when it expires; tokens last an hour
    token: String,
    subreddit: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Deserialize)]
struct ListingData<T> {
    children: Vec<Thing<T>>,
}

#[derive(Deserialize)]
struct Thing<T> {
    data: T,
}

#[derive(Deserialize)]
struct SubmissionData {
    id: String,
    title: String,
    permalink: String,
    author: String,
    created_utc: f64,
    link_flair_text: Option<String>,
    link_flair_template_id: Option<String>,
    approved_by: Option<String>,
}

#[derive(Deserialize)]
struct ModeratorData {
    name: String,
}

#[derive(Deserialize)]
struct MessageData {
    dest: String,
    body: String,
    created_utc: f64,
}

#[derive(Deserialize)]
struct RemovalReasonsResponse {
    data: HashMap<String, RemovalReasonData>,
}

#[derive(Deserialize)]
struct RemovalReasonData {
    message: String,
}

#[derive(Deserialize)]
struct WikiPage {
    data: WikiPageData,
}

#[derive(Deserialize)]
struct WikiPageData {
    content_md: String,
}

#[allow(clippy::cast_possible_truncation)]
fn timestamp(created_utc: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(created_utc as i64, 0)
        .single()
        .unwrap_or_default()
}

impl From<SubmissionData> for ItemSnapshot {
    fn from(data: SubmissionData) -> Self {
        Self {
            id: ItemId(data.id),
            title: data.title,
            permalink: format!("https://www.reddit.com{}", data.permalink),
            author: data.author,
            created_at: timestamp(data.created_utc),
            // Reddit sends empty strings for some unset flairs
            flair_text: data.link_flair_text.filter(|text| !text.is_empty()),
            flair_template_id: data.link_flair_template_id.filter(|id| !id.is_empty()),
            approved_by: data.approved_by.filter(|name| !name.is_empty()),
        }
    }
}

impl RedditGateway {
    /// Authenticate with the password grant and return a ready client.
    ///
    /// # Errors
    ///
    /// Returns a `GatewayError` if the token request fails; fatal at startup.
    pub async fn login(
        credentials: &Credentials,
        subreddit: impl Into<String>,
        user_agent: &str,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(user_agent)
            .build()?;

        let response = client
            .post(TOKEN_URL)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;

        Ok(Self {
            client,
            token: token.access_token,
            subreddit: subreddit.into(),
        })
    }

    /// Subreddit this gateway operates on.
    #[must_use]
    pub fn subreddit(&self) -> &str {
        &self.subreddit
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .client
            .post(format!("{API_BASE}{path}"))
            .bearer_auth(&self.token)
            .form(form)
            .send()
            .await?;
        check(response).await
    }

    /// Fetch a wiki page's markdown source, used for the bot configuration.
    pub async fn wiki_page(&self, page: &str) -> Result<String, GatewayError> {
        let page: WikiPage = self
            .get_json(&format!("/r/{}/wiki/{page}", self.subreddit))
            .await?;
        Ok(page.data.content_md)
    }
}

/// Map a non-success response to an api error with its body as detail.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(GatewayError::Api {
            status: status.as_u16(),
            detail: response.text().await.unwrap_or_default(),
        })
    }
}

#[async_trait::async_trait]
impl ItemGateway for RedditGateway {
    async fn fetch_item(&self, id: &ItemId) -> Result<ItemSnapshot, GatewayError> {
        let listing: Listing<SubmissionData> = self
            .get_json(&format!("/api/info?id=t3_{id}"))
            .await?;
        listing
            .data
            .children
            .into_iter()
            .next()
            .map(|thing| thing.data.into())
            .ok_or_else(|| GatewayError::NotFound(format!("t3_{id}")))
    }

    async fn list_current_moderators(&self) -> Result<HashSet<String>, GatewayError> {
        let listing: Listing<ModeratorData> = self
            .get_json(&format!("/r/{}/about/moderators", self.subreddit))
            .await?;
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|thing| thing.data.name)
            .collect())
    }

    async fn post_comment(&self, id: &ItemId, body: &str) -> Result<CommentId, GatewayError> {
        let thing_id = format!("t3_{id}");
        let response = self
            .post_form(
                "/api/comment",
                &[("api_type", "json"), ("thing_id", &thing_id), ("text", body)],
            )
            .await?;

        let value: serde_json::Value = response.json().await?;
        value
            .pointer("/json/data/things/0/data/id")
            .and_then(serde_json::Value::as_str)
            .map(|comment_id| CommentId(comment_id.to_string()))
            .ok_or_else(|| GatewayError::Decode("comment id missing from reply".to_string()))
    }

    async fn distinguish_and_sticky(&self, comment: &CommentId) -> Result<(), GatewayError> {
        let thing_id = format!("t1_{comment}");
        self.post_form(
            "/api/distinguish",
            &[
                ("api_type", "json"),
                ("id", &thing_id),
                ("how", "yes"),
                ("sticky", "true"),
            ],
        )
        .await?;
        Ok(())
    }

    async fn remove_item(&self, id: &ItemId, reason_id: &str) -> Result<(), GatewayError> {
        self.remove_item_plain(id).await?;

        let payload = serde_json::json!({
            "item_ids": [format!("t3_{id}")],
            "reason_id": reason_id,
        });
        let response = self
            .client
            .post(format!(
                "{API_BASE}/api/v1/modactions/removal_reasons"
            ))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn remove_item_plain(&self, id: &ItemId) -> Result<(), GatewayError> {
        let thing_id = format!("t3_{id}");
        self.post_form("/api/remove", &[("id", &thing_id), ("spam", "false")])
            .await?;
        Ok(())
    }

    async fn lock_item(&self, id: &ItemId) -> Result<(), GatewayError> {
        let thing_id = format!("t3_{id}");
        self.post_form("/api/lock", &[("id", &thing_id)]).await?;
        Ok(())
    }

    async fn send_direct_message(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GatewayError> {
        self.post_form(
            "/api/compose",
            &[
                ("api_type", "json"),
                ("to", recipient),
                ("subject", subject),
                ("text", body),
            ],
        )
        .await?;
        Ok(())
    }

    async fn list_sent_messages(&self) -> Result<Vec<SentMessage>, GatewayError> {
        let listing: Listing<MessageData> = self.get_json("/message/sent?limit=100").await?;
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|thing| SentMessage {
                recipient: thing.data.dest,
                body: thing.data.body,
                sent_at: timestamp(thing.data.created_utc),
            })
            .collect())
    }

    async fn removal_reason_message(&self, reason_id: &str) -> Result<String, GatewayError> {
        let reasons: RemovalReasonsResponse = self
            .get_json(&format!("/api/v1/{}/removal_reasons", self.subreddit))
            .await?;
        reasons
            .data
            .get(reason_id)
            .map(|reason| reason.message.clone())
            .ok_or_else(|| GatewayError::NotFound(format!("removal reason {reason_id}")))
    }
}

#[async_trait::async_trait]
impl ItemSource for RedditGateway {
    async fn newest_item_ids(&self) -> Result<Vec<ItemId>, GatewayError> {
        let listing: Listing<SubmissionData> = self
            .get_json(&format!("/r/{}/new?limit=100", self.subreddit))
            .await?;
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|thing| ItemId(thing.data.id))
            .collect())
    }
}
