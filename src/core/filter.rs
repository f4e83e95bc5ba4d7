//! 搜尋結果篩選與分頁
//!
//! 文字查詢在後端完成，這裡只處理其餘條件 (行政區、區、最低評分、是否有評論)，
//! 全部以 AND 組合，保留輸入順序後再切成固定大小的頁。

use crate::domain::model::{HouseListing, NamedOption};
use crate::utils::error::{AtlasError, Result};

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    query: String,
    adm_area: Option<String>,
    district: Option<String>,
    min_rating: f64,
    has_reviews: bool,
    page: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            query: String::new(),
            adm_area: None,
            district: None,
            min_rating: 0.0,
            has_reviews: false,
            page: 1,
        }
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn adm_area(&self) -> Option<&str> {
        self.adm_area.as_deref()
    }

    pub fn district(&self) -> Option<&str> {
        self.district.as_deref()
    }

    pub fn min_rating(&self) -> f64 {
        self.min_rating
    }

    pub fn has_reviews(&self) -> bool {
        self.has_reviews
    }

    pub fn page(&self) -> usize {
        self.page
    }

    // 任何篩選條件變動都回到第一頁

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page = 1;
    }

    pub fn set_adm_area(&mut self, adm_area: Option<String>) {
        self.adm_area = adm_area.filter(|s| !s.is_empty());
        self.page = 1;
    }

    pub fn set_district(&mut self, district: Option<String>) {
        self.district = district.filter(|s| !s.is_empty());
        self.page = 1;
    }

    pub fn set_min_rating(&mut self, min_rating: f64) -> Result<()> {
        if !min_rating.is_finite() || min_rating < 0.0 {
            return Err(AtlasError::InvalidFilter {
                message: format!("minimum rating must be a number >= 0, got {}", min_rating),
            });
        }
        self.min_rating = min_rating;
        self.page = 1;
        Ok(())
    }

    pub fn set_has_reviews(&mut self, has_reviews: bool) {
        self.has_reviews = has_reviews;
        self.page = 1;
    }

    /// 換頁必須落在 `[1, total_pages]`；空結果只有第 1 頁
    pub fn set_page(&mut self, page: usize, total_pages: usize) -> Result<()> {
        check_page(page, total_pages)?;
        self.page = page;
        Ok(())
    }

    pub fn first_page(&mut self) {
        self.page = 1;
    }

    /// 清除所有條件 (離開搜尋頁)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn matches(&self, listing: &HouseListing) -> bool {
        if let Some(adm_area) = &self.adm_area {
            if &listing.adm_area != adm_area {
                return false;
            }
        }

        if let Some(district) = &self.district {
            if &listing.district != district {
                return false;
            }
        }

        if self.min_rating > 0.0 {
            match listing.rating_value() {
                Some(rating) if rating >= self.min_rating => {}
                _ => return false,
            }
        }

        if self.has_reviews && !listing.has_reviews() {
            return false;
        }

        true
    }
}

fn check_page(page: usize, total_pages: usize) -> Result<()> {
    if page == 0 || page > total_pages.max(1) {
        return Err(AtlasError::PageOutOfRange { page, total_pages });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilteredListings<'a> {
    items: Vec<&'a HouseListing>,
}

impl<'a> FilteredListings<'a> {
    pub fn items(&self) -> &[&'a HouseListing] {
        &self.items
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn total_pages(&self) -> usize {
        self.items.len().div_ceil(PAGE_SIZE)
    }

    /// 第 `page` 頁 (從 1 開始)
    pub fn page(&self, page: usize) -> Result<&[&'a HouseListing]> {
        check_page(page, self.total_pages())?;
        let start = (page - 1) * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(self.items.len());
        Ok(&self.items[start.min(end)..end])
    }
}

/// 依 `state` 篩選，不改變原本順序
pub fn apply<'a>(listings: &'a [HouseListing], state: &FilterState) -> FilteredListings<'a> {
    let items: Vec<&HouseListing> = listings.iter().filter(|l| state.matches(l)).collect();
    tracing::debug!(
        "Filtered {} of {} listings (adm_area={:?}, district={:?}, min_rating={}, has_reviews={})",
        items.len(),
        listings.len(),
        state.adm_area,
        state.district,
        state.min_rating,
        state.has_reviews
    );
    FilteredListings { items }
}

/// 篩選選單用的名稱清單：去重並依語系排序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub adm_areas: Vec<String>,
    pub districts: Vec<String>,
}

impl FilterOptions {
    pub fn new(adm_areas: Vec<NamedOption>, districts: Vec<NamedOption>) -> Self {
        Self {
            adm_areas: sorted_names(adm_areas),
            districts: sorted_names(districts),
        }
    }
}

/// 俄文排序的主鍵：不分大小寫，ё 與 е 視為同一字母
fn collation_key(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'ё' { 'е' } else { c })
        .collect()
}

pub fn sorted_names(options: Vec<NamedOption>) -> Vec<String> {
    let mut names: Vec<String> = options
        .into_iter()
        .map(|o| o.name.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    names.sort_by_cached_key(|n| (collation_key(n), n.clone()));
    names.dedup();
    names
}
