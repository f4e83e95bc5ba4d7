//! 頁面層級的狀態：搜尋頁與地圖頁
//!
//! 每次搜尋都會發出一個遞增的 `RequestToken`，只有最新的 token 的回應會被採用，
//! 較舊的回應直接丟棄。狀態每次變動後都以 `watch` channel 推送新的畫面快照。

use crate::core::cluster::{BBox, ClusterId, ClusterIndex, ClusterOptions, ClusterPoint};
use crate::core::filter::{self, FilterOptions, FilterState, FilteredListings};
use crate::core::viewport::Viewport;
use crate::core::ListingSource;
use crate::domain::model::HouseListing;
use crate::utils::error::{AtlasError, Result};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken(u64);

#[derive(Debug, Default)]
struct RequestGuard {
    latest: u64,
}

impl RequestGuard {
    fn issue(&mut self) -> RequestToken {
        self.latest += 1;
        RequestToken(self.latest)
    }

    fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.latest
    }
}

/// 抓取失敗時一律當作空結果
fn settle(result: Result<Vec<HouseListing>>, query: &str) -> (Vec<HouseListing>, Option<String>) {
    match result {
        Ok(listings) => {
            tracing::info!("🔍 Search '{}' returned {} listings", query, listings.len());
            (listings, None)
        }
        Err(e) => {
            tracing::warn!("❌ Search '{}' failed: {}", query, e);
            (Vec::new(), Some(e.user_friendly_message()))
        }
    }
}

/// 搜尋頁的畫面快照
#[derive(Debug, Clone, PartialEq)]
pub struct SearchView {
    pub query: String,
    pub loading: bool,
    pub has_searched: bool,
    pub items: Vec<HouseListing>,
    pub total: usize,
    pub total_pages: usize,
    pub page: usize,
    pub error: Option<String>,
}

impl Default for SearchView {
    fn default() -> Self {
        Self {
            query: String::new(),
            loading: false,
            has_searched: false,
            items: Vec::new(),
            total: 0,
            total_pages: 0,
            page: 1,
            error: None,
        }
    }
}

pub struct SearchSession<S: ListingSource> {
    source: Arc<S>,
    state: FilterState,
    listings: Vec<HouseListing>,
    options: FilterOptions,
    guard: RequestGuard,
    loading: bool,
    has_searched: bool,
    error: Option<String>,
    view: watch::Sender<SearchView>,
}

impl<S: ListingSource> SearchSession<S> {
    pub fn new(source: Arc<S>) -> Self {
        let (view, _) = watch::channel(SearchView::default());
        Self {
            source,
            state: FilterState::new(),
            listings: Vec::new(),
            options: FilterOptions::default(),
            guard: RequestGuard::default(),
            loading: false,
            has_searched: false,
            error: None,
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchView> {
        self.view.subscribe()
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn listings(&self) -> &[HouseListing] {
        &self.listings
    }

    pub fn filter_options(&self) -> &FilterOptions {
        &self.options
    }

    pub fn filtered(&self) -> FilteredListings<'_> {
        filter::apply(&self.listings, &self.state)
    }

    pub fn current_page(&self) -> Result<Vec<&HouseListing>> {
        Ok(self.filtered().page(self.state.page())?.to_vec())
    }

    /// 空白查詢不送出
    pub fn begin_search(&mut self, query: &str) -> Option<RequestToken> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        self.state.set_query(query);
        self.loading = true;
        self.has_searched = true;
        self.publish();
        Some(self.guard.issue())
    }

    /// 回傳是否採用了這次的回應
    pub fn complete_search(
        &mut self,
        token: RequestToken,
        result: Result<Vec<HouseListing>>,
    ) -> bool {
        if !self.guard.is_current(token) {
            tracing::debug!("Discarding stale search response {:?}", token);
            return false;
        }

        let (listings, error) = settle(result, self.state.query());
        self.listings = listings;
        self.error = error;
        self.loading = false;
        // 新的結果集一律從第一頁開始
        self.state.first_page();
        self.publish();
        true
    }

    pub async fn search(&mut self, query: &str) -> bool {
        let Some(token) = self.begin_search(query) else {
            return false;
        };
        let result = self.source.search_houses(self.state.query()).await;
        self.complete_search(token, result)
    }

    /// 載入行政區與區的選項
    pub async fn load_filter_options(&mut self) -> Result<&FilterOptions> {
        let (adm_areas, districts) =
            tokio::try_join!(self.source.adm_areas(), self.source.districts())?;
        self.options = FilterOptions::new(adm_areas, districts);
        tracing::debug!(
            "Loaded {} administrative areas and {} districts",
            self.options.adm_areas.len(),
            self.options.districts.len()
        );
        Ok(&self.options)
    }

    pub fn set_adm_area(&mut self, adm_area: Option<String>) {
        self.state.set_adm_area(adm_area);
        self.publish();
    }

    pub fn set_district(&mut self, district: Option<String>) {
        self.state.set_district(district);
        self.publish();
    }

    pub fn set_min_rating(&mut self, min_rating: f64) -> Result<()> {
        self.state.set_min_rating(min_rating)?;
        self.publish();
        Ok(())
    }

    pub fn set_has_reviews(&mut self, has_reviews: bool) {
        self.state.set_has_reviews(has_reviews);
        self.publish();
    }

    pub fn go_to_page(&mut self, page: usize) -> Result<()> {
        let total_pages = self.filtered().total_pages();
        self.state.set_page(page, total_pages)?;
        self.publish();
        Ok(())
    }

    /// 清除查詢與結果；尚未回來的請求也一併作廢
    pub fn clear(&mut self) {
        self.guard.issue();
        self.state.reset();
        self.listings.clear();
        self.loading = false;
        self.has_searched = false;
        self.error = None;
        self.publish();
    }

    fn publish(&self) {
        let filtered = self.filtered();
        let items = match filtered.page(self.state.page()) {
            Ok(page) => page.iter().map(|l| (*l).clone()).collect(),
            Err(e) => {
                tracing::error!("Search view out of sync: {}", e);
                Vec::new()
            }
        };

        self.view.send_replace(SearchView {
            query: self.state.query().to_string(),
            loading: self.loading,
            has_searched: self.has_searched,
            items,
            total: filtered.total(),
            total_pages: filtered.total_pages(),
            page: self.state.page(),
            error: self.error.clone(),
        });
    }
}

/// 地圖頁的畫面快照
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub viewport: Viewport,
    pub bounds: BBox,
    pub points: Vec<ClusterPoint>,
    pub selected: Option<HouseListing>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct MapSession<S: ListingSource> {
    source: Arc<S>,
    index: ClusterIndex,
    listings: Vec<HouseListing>,
    viewport: Viewport,
    points: Vec<ClusterPoint>,
    selected: Option<String>,
    query: String,
    guard: RequestGuard,
    loading: bool,
    error: Option<String>,
    view: watch::Sender<MapView>,
}

impl<S: ListingSource> MapSession<S> {
    pub fn new(source: Arc<S>, options: ClusterOptions, viewport: Viewport) -> Result<Self> {
        let index = ClusterIndex::new(options)?;
        let (view, _) = watch::channel(MapView {
            viewport,
            bounds: viewport.bounds(),
            points: Vec::new(),
            selected: None,
            loading: false,
            error: None,
        });
        Ok(Self {
            source,
            index,
            listings: Vec::new(),
            viewport,
            points: Vec::new(),
            selected: None,
            query: String::new(),
            guard: RequestGuard::default(),
            loading: false,
            error: None,
            view,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<MapView> {
        self.view.subscribe()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn points(&self) -> &[ClusterPoint] {
        &self.points
    }

    pub fn listings(&self) -> &[HouseListing] {
        &self.listings
    }

    pub fn index(&self) -> &ClusterIndex {
        &self.index
    }

    pub fn begin_search(&mut self, query: &str) -> Option<RequestToken> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        self.query = query.to_string();
        self.loading = true;
        self.publish();
        Some(self.guard.issue())
    }

    pub fn complete_search(
        &mut self,
        token: RequestToken,
        result: Result<Vec<HouseListing>>,
    ) -> bool {
        if !self.guard.is_current(token) {
            tracing::debug!("Discarding stale map response {:?}", token);
            return false;
        }

        let (listings, error) = settle(result, &self.query);
        // 地圖只保留有座標的房屋
        self.listings = listings
            .into_iter()
            .filter(|l| l.coordinates().is_some())
            .collect();
        self.error = error;
        self.loading = false;
        self.index.load(&self.listings);

        if let Some(id) = &self.selected {
            if !self.listings.iter().any(|l| &l.id == id) {
                self.selected = None;
            }
        }

        self.recompute();
        true
    }

    pub async fn search(&mut self, query: &str) -> bool {
        let Some(token) = self.begin_search(query) else {
            return false;
        };
        let result = self.source.search_houses(&self.query).await;
        self.complete_search(token, result)
    }

    /// 地圖平移或縮放；縮放限制在索引的 `[min_zoom, max_zoom]`
    pub fn on_move(&mut self, latitude: f64, longitude: f64, zoom: f64) {
        let options = self.index.options();
        let zoom = if zoom.is_finite() {
            zoom.clamp(options.min_zoom as f64, options.max_zoom as f64)
        } else {
            self.viewport.zoom
        };
        self.viewport.recenter(latitude, longitude, zoom);
        self.recompute();
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.width = width;
        self.viewport.height = height;
        self.recompute();
    }

    /// 點擊聚合點：以其中心、展開層級重新置中，回傳新的縮放層級
    pub fn click_cluster(&mut self, id: ClusterId) -> Result<u8> {
        let (latitude, longitude) = self
            .points
            .iter()
            .find_map(|p| match p {
                ClusterPoint::Cluster {
                    id: cid,
                    latitude,
                    longitude,
                    ..
                } if *cid == id => Some((*latitude, *longitude)),
                _ => None,
            })
            .ok_or(AtlasError::UnknownCluster(id.as_u64()))?;

        let zoom = self.index.expansion_zoom(id)?;
        tracing::debug!(
            "Expanding cluster {} to zoom {} at ({:.5}, {:.5})",
            id,
            zoom,
            latitude,
            longitude
        );
        self.on_move(latitude, longitude, zoom as f64);
        Ok(zoom)
    }

    /// 同一時間只會有一間被選取的房屋
    pub fn select_house(&mut self, house_id: &str) -> Result<()> {
        if !self.listings.iter().any(|l| l.id == house_id) {
            return Err(AtlasError::UnknownListing(house_id.to_string()));
        }
        self.selected = Some(house_id.to_string());
        self.publish();
        Ok(())
    }

    pub fn close_popup(&mut self) {
        self.selected = None;
        self.publish();
    }

    pub fn selected_listing(&self) -> Option<&HouseListing> {
        let id = self.selected.as_ref()?;
        self.listings.iter().find(|l| &l.id == id)
    }

    fn recompute(&mut self) {
        self.points = self.index.clusters(self.viewport.bounds(), self.viewport.zoom);
        self.publish();
    }

    fn publish(&self) {
        self.view.send_replace(MapView {
            viewport: self.viewport,
            bounds: self.viewport.bounds(),
            points: self.points.clone(),
            selected: self.selected_listing().cloned(),
            loading: self.loading,
            error: self.error.clone(),
        });
    }
}
