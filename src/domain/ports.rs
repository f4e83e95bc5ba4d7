use crate::domain::model::{
    CurrentUser, HouseListing, ModerationAction, NamedOption, PendingReview, Registration, Review,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 房屋資料來源 (搜尋、詳細資料、篩選選項)
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn search_houses(&self, query: &str) -> Result<Vec<HouseListing>>;
    async fn house_by_id(&self, id: &str) -> Result<HouseListing>;
    async fn adm_areas(&self) -> Result<Vec<NamedOption>>;
    async fn districts(&self) -> Result<Vec<NamedOption>>;
}

#[async_trait]
pub trait ReviewGateway: Send + Sync {
    async fn add_review(&self, house_id: &str, review_text: &str, rating: u8)
        -> Result<HouseListing>;
    async fn edit_review(&self, review_id: &str, new_rating: u8, new_text: &str) -> Result<Review>;
    async fn moderate_review(&self, review_id: &str, action: ModerationAction) -> Result<Review>;
    async fn pending_reviews(&self) -> Result<Vec<PendingReview>>;
}

/// 外部身分服務；憑證 (cookie) 由實作自行保存
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Result<CurrentUser>;
    async fn login(&self, username: &str, password: &str) -> Result<()>;
    async fn register(&self, registration: &Registration) -> Result<()>;
    fn clear_credentials(&self);
}
