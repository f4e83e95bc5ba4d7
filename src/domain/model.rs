use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// 後端回傳的評分，可能是數字也可能是字串 (Decimal 序列化結果)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rating {
    Number(f64),
    Text(String),
}

impl Rating {
    /// 解析成數值；無法解析或非有限值回傳 None
    pub fn value(&self) -> Option<f64> {
        let parsed = match self {
            Rating::Number(n) => Some(*n),
            Rating::Text(s) => s.trim().parse::<f64>().ok(),
        };
        parsed.filter(|v| v.is_finite())
    }
}

impl From<f64> for Rating {
    fn from(value: f64) -> Self {
        Rating::Number(value)
    }
}

impl From<&str> for Rating {
    fn from(value: &str) -> Self {
        Rating::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub house_id: String,
    pub user_id: String,
    pub rating: u8,
    pub review_text: String,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Review {
    pub fn is_visible(&self) -> bool {
        self.is_published && !self.is_deleted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseListing {
    pub id: String,
    #[serde(default)]
    pub simple_address: String,
    #[serde(default)]
    pub adm_area: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub rating: Option<Rating>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub rating_count: u32,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl HouseListing {
    pub fn new(id: impl Into<String>, simple_address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            simple_address: simple_address.into(),
            adm_area: String::new(),
            district: String::new(),
            rating: None,
            rating_count: 0,
            latitude: None,
            longitude: None,
            reviews: Vec::new(),
        }
    }

    /// (longitude, latitude)；任一缺失或非有限值即無法上地圖
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.longitude, self.latitude) {
            (Some(lng), Some(lat)) if lng.is_finite() && lat.is_finite() => Some((lng, lat)),
            _ => None,
        }
    }

    pub fn rating_value(&self) -> Option<f64> {
        self.rating.as_ref().and_then(Rating::value)
    }

    pub fn has_reviews(&self) -> bool {
        !self.reviews.is_empty()
    }

    /// 已發佈且未刪除的評論
    pub fn visible_reviews(&self) -> impl Iterator<Item = &Review> {
        self.reviews.iter().filter(|r| r.is_visible())
    }

    /// 以可見評論重新計算平均分
    pub fn visible_average_rating(&self) -> Option<f64> {
        let (sum, count) = self
            .visible_reviews()
            .fold((0u32, 0u32), |(sum, count), r| (sum + r.rating as u32, count + 1));
        (count > 0).then(|| sum as f64 / count as f64)
    }
}

fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0) as u32,
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// 下拉選單選項 (行政區、區)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedOption {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    User,
    SuperUser,
    Admin,
    Other(String),
}

impl Role {
    pub fn from_name(name: &str) -> Self {
        match name {
            "User" => Role::User,
            "Super User" => Role::SuperUser,
            "Admin" => Role::Admin,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn can_moderate(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// 只有 Super User 能修改評論，管理員負責審核
    pub fn can_edit_reviews(&self) -> bool {
        matches!(self, Role::SuperUser)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub role_name: String,
}

impl CurrentUser {
    pub fn role(&self) -> Role {
        Role::from_name(&self.role_name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Reject,
}

/// 待審核評論 (管理員頁面)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReview {
    pub id: String,
    pub house_id: String,
    pub house_address: String,
    pub user_id: String,
    pub username: String,
    pub rating: u8,
    pub review_text: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_parsing() {
        assert_eq!(Rating::from("4.2").value(), Some(4.2));
        assert_eq!(Rating::from(" 3.5 ").value(), Some(3.5));
        assert_eq!(Rating::from("abc").value(), None);
        assert_eq!(Rating::from("NaN").value(), None);
        assert_eq!(Rating::from(5.0).value(), Some(5.0));
    }

    #[test]
    fn test_listing_deserializes_backend_shape() {
        let json = serde_json::json!({
            "id": "h1",
            "simple_address": "ул. Садовая, 1",
            "adm_area": "ЦАО",
            "district": "Арбат",
            "rating": "4.50",
            "rating_count": "2",
            "latitude": 55.75,
            "longitude": 37.61,
            "reviews": [{
                "id": "r1",
                "house_id": "h1",
                "user_id": "u1",
                "rating": 5,
                "review_text": "Отличный дом!",
                "is_published": true,
                "is_deleted": false,
                "created_at": "2024-01-15T10:30:00Z",
                "modified_at": "2024-01-15T10:30:00Z"
            }]
        });

        let listing: HouseListing = serde_json::from_value(json).unwrap();
        assert_eq!(listing.rating_value(), Some(4.5));
        assert_eq!(listing.rating_count, 2);
        assert_eq!(listing.coordinates(), Some((37.61, 55.75)));
        assert!(listing.has_reviews());
        assert_eq!(listing.visible_average_rating(), Some(5.0));
    }

    #[test]
    fn test_missing_coordinates_and_nulls() {
        let json = serde_json::json!({
            "id": "h2",
            "rating": null,
            "latitude": null,
            "longitude": 37.0
        });
        let listing: HouseListing = serde_json::from_value(json).unwrap();
        assert_eq!(listing.coordinates(), None);
        assert_eq!(listing.rating_value(), None);
        assert_eq!(listing.rating_count, 0);
        assert!(listing.reviews.is_empty());
    }

    #[test]
    fn test_role_from_name() {
        assert_eq!(Role::from_name("Super User"), Role::SuperUser);
        assert!(Role::from_name("Admin").can_moderate());
        assert!(Role::from_name("Super User").can_edit_reviews());
        assert!(!Role::from_name("User").can_edit_reviews());
        assert!(!Role::from_name("Admin").can_edit_reviews());
        assert!(!Role::from_name("Super User").can_moderate());
        assert_eq!(Role::from_name("Guest"), Role::Other("Guest".to_string()));
    }
}
