use crate::core::auth::AuthSession;
use crate::core::{IdentityProvider, ReviewGateway};
use crate::domain::model::{HouseListing, ModerationAction, PendingReview, Review};
use crate::utils::error::{AtlasError, Result};
use std::sync::Arc;

pub const MIN_REVIEW_RATING: u8 = 1;
pub const MAX_REVIEW_RATING: u8 = 5;

fn validate_review(rating: u8, text: &str) -> Result<()> {
    if !(MIN_REVIEW_RATING..=MAX_REVIEW_RATING).contains(&rating) {
        return Err(AtlasError::InvalidReview {
            message: format!(
                "rating must be between {} and {}, got {}",
                MIN_REVIEW_RATING, MAX_REVIEW_RATING, rating
            ),
        });
    }
    if text.trim().is_empty() {
        return Err(AtlasError::InvalidReview {
            message: "review text cannot be empty".to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PendingOrder {
    #[default]
    Newest,
    Oldest,
}

/// 待審核清單的篩選：指定評分 (完全相符) 與依建立時間排序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingFilter {
    pub rating: Option<u8>,
    pub order: PendingOrder,
}

impl PendingFilter {
    pub fn apply(&self, mut reviews: Vec<PendingReview>) -> Vec<PendingReview> {
        if let Some(rating) = self.rating {
            reviews.retain(|r| r.rating == rating);
        }
        match self.order {
            PendingOrder::Newest => reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            PendingOrder::Oldest => reviews.sort_by_key(|r| r.created_at),
        }
        reviews
    }
}

/// 評論的送出、編輯與審核；權限依 `AuthSession` 的角色判斷
pub struct ReviewDesk<G: ReviewGateway> {
    gateway: Arc<G>,
}

impl<G: ReviewGateway> ReviewDesk<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// 新評論會先進入審核，回傳後端更新後的房屋
    pub async fn submit<I: IdentityProvider>(
        &self,
        auth: &AuthSession<I>,
        house_id: &str,
        text: &str,
        rating: u8,
    ) -> Result<HouseListing> {
        auth.require_user()?;
        validate_review(rating, text)?;
        let house = self.gateway.add_review(house_id, text.trim(), rating).await?;
        tracing::info!("📝 Review submitted for house {}", house_id);
        Ok(house)
    }

    pub async fn edit<I: IdentityProvider>(
        &self,
        auth: &AuthSession<I>,
        review_id: &str,
        rating: u8,
        text: &str,
    ) -> Result<Review> {
        let user = auth.require_user()?;
        if !user.role().can_edit_reviews() {
            return Err(AtlasError::Forbidden {
                action: "edit reviews".to_string(),
            });
        }
        validate_review(rating, text)?;
        self.gateway.edit_review(review_id, rating, text.trim()).await
    }

    pub async fn moderate<I: IdentityProvider>(
        &self,
        auth: &AuthSession<I>,
        review_id: &str,
        action: ModerationAction,
    ) -> Result<Review> {
        let user = auth.require_user()?;
        if !user.role().can_moderate() {
            return Err(AtlasError::Forbidden {
                action: "moderate reviews".to_string(),
            });
        }
        let review = self.gateway.moderate_review(review_id, action).await?;
        tracing::info!("Review {} moderated: {:?}", review_id, action);
        Ok(review)
    }

    pub async fn pending<I: IdentityProvider>(
        &self,
        auth: &AuthSession<I>,
        filter: PendingFilter,
    ) -> Result<Vec<PendingReview>> {
        let user = auth.require_user()?;
        if !user.role().can_moderate() {
            return Err(AtlasError::Forbidden {
                action: "moderate reviews".to_string(),
            });
        }
        let reviews = self.gateway.pending_reviews().await?;
        let total = reviews.len();
        let reviews = filter.apply(reviews);
        tracing::debug!("Showing {} of {} pending reviews", reviews.len(), total);
        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn pending(id: &str, rating: u8, day: u32) -> PendingReview {
        let created_at = Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap();
        PendingReview {
            id: id.to_string(),
            house_id: "h1".to_string(),
            house_address: "ул. Садовая, 1".to_string(),
            user_id: "u1".to_string(),
            username: "boris".to_string(),
            rating,
            review_text: "Хороший дом".to_string(),
            created_at,
            modified_at: created_at,
        }
    }

    fn ids(reviews: &[PendingReview]) -> Vec<&str> {
        reviews.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_pending_filter_orders_by_created_at() {
        let queue = vec![pending("r1", 4, 2), pending("r2", 5, 9), pending("r3", 4, 5)];

        let newest = PendingFilter::default().apply(queue.clone());
        assert_eq!(ids(&newest), vec!["r2", "r3", "r1"]);

        let oldest = PendingFilter {
            order: PendingOrder::Oldest,
            ..Default::default()
        }
        .apply(queue);
        assert_eq!(ids(&oldest), vec!["r1", "r3", "r2"]);
    }

    #[test]
    fn test_pending_filter_by_exact_rating() {
        let queue = vec![pending("r1", 4, 2), pending("r2", 5, 9), pending("r3", 4, 5)];

        let fours = PendingFilter {
            rating: Some(4),
            order: PendingOrder::Oldest,
        }
        .apply(queue.clone());
        assert_eq!(ids(&fours), vec!["r1", "r3"]);

        let ones = PendingFilter {
            rating: Some(1),
            ..Default::default()
        }
        .apply(queue);
        assert!(ones.is_empty());
    }

    #[test]
    fn test_validate_review() {
        assert!(validate_review(5, "Отличный дом!").is_ok());
        assert!(validate_review(1, "плохо").is_ok());
        assert!(validate_review(0, "плохо").is_err());
        assert!(validate_review(6, "плохо").is_err());
        assert!(validate_review(3, "   ").is_err());
    }
}
