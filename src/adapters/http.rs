use crate::adapters::cookies::SessionCookies;
use crate::config::BackendConfig;
use crate::core::{IdentityProvider, ListingSource, ReviewGateway};
use crate::domain::model::{
    CurrentUser, HouseListing, ModerationAction, NamedOption, PendingReview, Registration, Review,
};
use crate::utils::error::{AtlasError, Result};
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// 後端 REST API 的客戶端；登入後的 cookie 保存在 `SessionCookies`
pub struct BackendClient {
    base_url: Url,
    client: Client,
    cookies: Arc<SessionCookies>,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        validate_url("backend.base_url", base_url)?;
        let base_url = Url::parse(base_url).map_err(|e| AtlasError::ConfigError {
            message: format!("Invalid backend URL '{}': {}", base_url, e),
        })?;

        let cookies = Arc::new(SessionCookies::default());
        let client = Client::builder()
            .cookie_provider(cookies.clone())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url,
            client,
            cookies,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AtlasError::ConfigError {
                message: format!("Backend URL cannot be a base: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let response = check_status(response)?;
        Ok(response.json().await?)
    }

    async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        let response = check_status(response)?;
        Ok(response.json().await?)
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    tracing::debug!("API response status: {}", status);
    if status.is_success() {
        Ok(response)
    } else {
        Err(AtlasError::HttpStatus {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

#[async_trait]
impl ListingSource for BackendClient {
    async fn search_houses(&self, query: &str) -> Result<Vec<HouseListing>> {
        let mut url = self.endpoint(&["houses", "search"])?;
        url.query_pairs_mut().append_pair("query", query);
        self.get_json(url).await
    }

    async fn house_by_id(&self, id: &str) -> Result<HouseListing> {
        let url = self.endpoint(&["house", id])?;
        self.get_json(url).await
    }

    async fn adm_areas(&self) -> Result<Vec<NamedOption>> {
        let url = self.endpoint(&["adm_areas"])?;
        self.get_json(url).await
    }

    async fn districts(&self) -> Result<Vec<NamedOption>> {
        let url = self.endpoint(&["districts"])?;
        self.get_json(url).await
    }
}

#[derive(Serialize)]
struct NewReview<'a> {
    review_text: &'a str,
    rating: u8,
}

#[derive(Serialize)]
struct EditReview<'a> {
    review_id: &'a str,
    new_rating: u8,
    new_review_text: &'a str,
}

#[derive(Serialize)]
struct Moderation<'a> {
    review_id: &'a str,
    action: ModerationAction,
}

#[async_trait]
impl ReviewGateway for BackendClient {
    async fn add_review(
        &self,
        house_id: &str,
        review_text: &str,
        rating: u8,
    ) -> Result<HouseListing> {
        let url = self.endpoint(&["house", house_id, "reviews"])?;
        self.post_json(url, &NewReview { review_text, rating })
            .await
    }

    async fn edit_review(&self, review_id: &str, new_rating: u8, new_text: &str) -> Result<Review> {
        let url = self.endpoint(&["review", "edit"])?;
        let body = EditReview {
            review_id,
            new_rating,
            new_review_text: new_text,
        };
        self.post_json(url, &body).await
    }

    async fn moderate_review(&self, review_id: &str, action: ModerationAction) -> Result<Review> {
        let url = self.endpoint(&["review", "moderate"])?;
        self.post_json(url, &Moderation { review_id, action }).await
    }

    async fn pending_reviews(&self) -> Result<Vec<PendingReview>> {
        let url = self.endpoint(&["admin", "pending-reviews"])?;
        self.get_json(url).await
    }
}

#[async_trait]
impl IdentityProvider for BackendClient {
    async fn current_user(&self) -> Result<CurrentUser> {
        let url = self.endpoint(&["users", "getuser"])?;
        self.get_json(url).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<()> {
        let url = self.endpoint(&["login"])?;
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        check_status(response)?;
        Ok(())
    }

    async fn register(&self, registration: &Registration) -> Result<()> {
        let url = self.endpoint(&["register"])?;
        let _user: serde_json::Value = self.post_json(url, registration).await?;
        Ok(())
    }

    fn clear_credentials(&self) {
        self.cookies.clear();
    }
}
