//! 地圖標記聚合
//!
//! 每個縮放層級各建一棵 R-tree。最底層 (`max_zoom + 1`) 是原始房屋座標，
//! 往上每一層把距離在 `radius` 像素內的點合併成一個聚合點，座標為加權中心。
//! 查詢時只看 `[min_zoom, max_zoom]` 的層級，而且同座標的點不受 `min_points` 限制一律合併，
//! 所以座標完全相同的房屋永遠不會被拆開。

use crate::domain::model::HouseListing;
use crate::utils::error::{AtlasError, Result};
use crate::utils::validation::{validate_positive_number, validate_range, Validate};
use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};
use std::f64::consts::PI;

pub const DEFAULT_RADIUS: f64 = 75.0;
pub const DEFAULT_EXTENT: f64 = 512.0;
pub const DEFAULT_MAX_ZOOM: u8 = 20;

// ClusterId 以低 5 bits 存放層級
const ZOOM_BITS: u64 = 5;
const ZOOM_MASK: u64 = (1 << ZOOM_BITS) - 1;
pub(crate) const MAX_SUPPORTED_ZOOM: u8 = 30;
const UNVISITED: u8 = u8::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterOptions {
    /// 合併半徑 (像素)
    pub radius: f64,
    /// 單一圖磚的像素寬度
    pub extent: f64,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub min_points: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            extent: DEFAULT_EXTENT,
            min_zoom: 0,
            max_zoom: DEFAULT_MAX_ZOOM,
            min_points: 2,
        }
    }
}

impl Validate for ClusterOptions {
    fn validate(&self) -> Result<()> {
        validate_range("map.max_zoom", self.max_zoom, 0, MAX_SUPPORTED_ZOOM)?;
        validate_range("map.min_zoom", self.min_zoom, 0, self.max_zoom)?;
        validate_positive_number("map.min_points", self.min_points, 2)?;
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(AtlasError::InvalidConfigValueError {
                field: "map.radius".to_string(),
                value: self.radius.to_string(),
                reason: "Radius must be a positive number".to_string(),
            });
        }
        if !(self.extent.is_finite() && self.extent > 0.0) {
            return Err(AtlasError::InvalidConfigValueError {
                field: "map.extent".to_string(),
                value: self.extent.to_string(),
                reason: "Extent must be a positive number".to_string(),
            });
        }
        Ok(())
    }
}

/// 聚合點識別碼；編碼了產生它的層級與該層的索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(u64);

impl ClusterId {
    fn new(origin_index: usize, origin_zoom: u8) -> Self {
        ClusterId(((origin_index as u64) << ZOOM_BITS) | origin_zoom as u64)
    }

    pub fn from_u64(raw: u64) -> Self {
        ClusterId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    fn origin_index(self) -> usize {
        (self.0 >> ZOOM_BITS) as usize
    }

    fn origin_zoom(self) -> u8 {
        (self.0 & ZOOM_MASK) as u8
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 地圖上的一個標記：聚合點或單一房屋
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterPoint {
    Cluster {
        id: ClusterId,
        longitude: f64,
        latitude: f64,
        count: usize,
    },
    Leaf {
        house_id: String,
        longitude: f64,
        latitude: f64,
    },
}

impl ClusterPoint {
    pub fn is_cluster(&self) -> bool {
        matches!(self, ClusterPoint::Cluster { .. })
    }

    pub fn count(&self) -> usize {
        match self {
            ClusterPoint::Cluster { count, .. } => *count,
            ClusterPoint::Leaf { .. } => 1,
        }
    }

    pub fn longitude(&self) -> f64 {
        match self {
            ClusterPoint::Cluster { longitude, .. } | ClusterPoint::Leaf { longitude, .. } => {
                *longitude
            }
        }
    }

    pub fn latitude(&self) -> f64 {
        match self {
            ClusterPoint::Cluster { latitude, .. } | ClusterPoint::Leaf { latitude, .. } => {
                *latitude
            }
        }
    }
}

/// `[west, south, east, north]`，單位為度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    pub const WORLD: BBox = BBox {
        west: -180.0,
        south: -90.0,
        east: 180.0,
        north: 90.0,
    };

    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }
}

impl From<[f64; 4]> for BBox {
    fn from(b: [f64; 4]) -> Self {
        BBox::new(b[0], b[1], b[2], b[3])
    }
}

#[derive(Debug, Clone)]
struct LeafPoint {
    house_id: String,
    longitude: f64,
    latitude: f64,
}

#[derive(Debug, Clone, Copy)]
enum NodeSource {
    Leaf(usize),
    Cluster(ClusterId),
}

#[derive(Debug, Clone)]
struct Node {
    x: f64,
    y: f64,
    count: usize,
    source: NodeSource,
    // 已被哪個層級處理過
    zoom: u8,
    parent: Option<ClusterId>,
}

impl Node {
    fn carried(&self) -> Node {
        Node {
            zoom: UNVISITED,
            parent: None,
            ..self.clone()
        }
    }
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

struct Level {
    nodes: Vec<Node>,
    tree: RTree<IndexedPoint>,
}

impl Level {
    fn new(nodes: Vec<Node>) -> Self {
        let points = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| IndexedPoint::new([n.x, n.y], i))
            .collect();
        Self {
            nodes,
            tree: RTree::bulk_load(points),
        }
    }

    fn within(&self, x: f64, y: f64, radius: f64) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .tree
            .locate_within_distance([x, y], radius * radius)
            .map(|p| p.data)
            .collect();
        ids.sort_unstable();
        ids
    }
}

pub struct ClusterIndex {
    options: ClusterOptions,
    leaves: Vec<LeafPoint>,
    // levels[z - min_zoom]，z 從 min_zoom 到 max_zoom + 1
    levels: Vec<Level>,
}

impl ClusterIndex {
    pub fn new(options: ClusterOptions) -> Result<Self> {
        options.validate()?;
        let mut index = Self {
            options,
            leaves: Vec::new(),
            levels: Vec::new(),
        };
        index.load(&[]);
        Ok(index)
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// 有座標的房屋數
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// 重建索引；缺少經緯度的房屋直接略過
    pub fn load(&mut self, listings: &[HouseListing]) {
        self.leaves = listings
            .iter()
            .filter_map(|l| {
                l.coordinates().map(|(longitude, latitude)| LeafPoint {
                    house_id: l.id.clone(),
                    longitude,
                    latitude,
                })
            })
            .collect();

        let skipped = listings.len() - self.leaves.len();
        if skipped > 0 {
            tracing::debug!("Skipped {} listings without coordinates", skipped);
        }

        let nodes: Vec<Node> = self
            .leaves
            .iter()
            .enumerate()
            .map(|(i, leaf)| Node {
                x: lng_x(leaf.longitude),
                y: lat_y(leaf.latitude),
                count: 1,
                source: NodeSource::Leaf(i),
                zoom: UNVISITED,
                parent: None,
            })
            .collect();

        let depth = (self.options.max_zoom - self.options.min_zoom) as usize + 2;
        let mut levels = Vec::with_capacity(depth);
        let mut current = Level::new(nodes);
        for zoom in (self.options.min_zoom..=self.options.max_zoom).rev() {
            let next = self.cluster_level(&mut current, zoom);
            levels.push(current);
            current = Level::new(next);
        }
        levels.push(current);
        levels.reverse();
        self.levels = levels;

        tracing::debug!(
            "Built cluster index: {} points, {} clusters at zoom {}",
            self.leaves.len(),
            self.levels[0].nodes.len(),
            self.options.min_zoom
        );
    }

    fn cluster_level(&self, level: &mut Level, zoom: u8) -> Vec<Node> {
        let radius = self.options.radius / (self.options.extent * 2f64.powi(zoom as i32));
        let mut next = Vec::new();

        for i in 0..level.nodes.len() {
            if level.nodes[i].zoom <= zoom {
                continue;
            }
            level.nodes[i].zoom = zoom;

            let (x, y, origin_count) = {
                let p = &level.nodes[i];
                (p.x, p.y, p.count)
            };
            let neighbors = level.within(x, y, radius);

            let count = origin_count
                + neighbors
                    .iter()
                    .filter(|&&j| level.nodes[j].zoom > zoom)
                    .map(|&j| level.nodes[j].count)
                    .sum::<usize>();

            // 不足 min_points 時，仍要合併完全同座標的點
            let merged: Vec<usize> = neighbors
                .iter()
                .copied()
                .filter(|&j| {
                    let b = &level.nodes[j];
                    b.zoom > zoom && (count >= self.options.min_points || (b.x == x && b.y == y))
                })
                .collect();

            if merged.is_empty() {
                next.push(level.nodes[i].carried());
            } else {
                let id = ClusterId::new(i, zoom + 1);
                let mut wx = x * origin_count as f64;
                let mut wy = y * origin_count as f64;
                let mut merged_count = origin_count;

                for &j in &merged {
                    let b = &mut level.nodes[j];
                    b.zoom = zoom;
                    b.parent = Some(id);
                    wx += b.x * b.count as f64;
                    wy += b.y * b.count as f64;
                    merged_count += b.count;
                }
                level.nodes[i].parent = Some(id);

                next.push(Node {
                    x: wx / merged_count as f64,
                    y: wy / merged_count as f64,
                    count: merged_count,
                    source: NodeSource::Cluster(id),
                    zoom: UNVISITED,
                    parent: None,
                });
            }

            // 沒被合併的鄰居原樣帶到下一層
            for &j in &neighbors {
                if level.nodes[j].zoom <= zoom {
                    continue;
                }
                level.nodes[j].zoom = zoom;
                next.push(level.nodes[j].carried());
            }
        }

        next
    }

    /// 縮放層級取整並限制在 `[min_zoom, max_zoom]`
    pub fn limit_zoom(&self, zoom: f64) -> u8 {
        if !zoom.is_finite() {
            return self.options.min_zoom;
        }
        zoom.floor()
            .clamp(self.options.min_zoom as f64, self.options.max_zoom as f64) as u8
    }

    /// 取得可視範圍內的標記，回傳順序依索引位置固定
    pub fn clusters(&self, bbox: BBox, zoom: f64) -> Vec<ClusterPoint> {
        let mut min_lng = normalize_lng(bbox.west);
        let min_lat = bbox.south.clamp(-90.0, 90.0);
        let mut max_lng = if bbox.east == 180.0 {
            180.0
        } else {
            normalize_lng(bbox.east)
        };
        let max_lat = bbox.north.clamp(-90.0, 90.0);

        if bbox.east - bbox.west >= 360.0 {
            min_lng = -180.0;
            max_lng = 180.0;
        } else if min_lng > max_lng {
            // 跨越換日線
            let mut eastern = self.clusters(BBox::new(min_lng, min_lat, 180.0, max_lat), zoom);
            let western = self.clusters(BBox::new(-180.0, min_lat, max_lng, max_lat), zoom);
            eastern.extend(western);
            return eastern;
        }

        let level = self.level(self.limit_zoom(zoom));
        let envelope = AABB::from_corners(
            [lng_x(min_lng), lat_y(max_lat)],
            [lng_x(max_lng), lat_y(min_lat)],
        );
        let mut ids: Vec<usize> = level
            .tree
            .locate_in_envelope(&envelope)
            .map(|p| p.data)
            .collect();
        ids.sort_unstable();

        ids.into_iter()
            .map(|i| self.to_point(&level.nodes[i]))
            .collect()
    }

    /// 聚合點在下一層拆出的子節點
    pub fn children(&self, id: ClusterId) -> Result<Vec<ClusterPoint>> {
        Ok(self
            .child_nodes(id)?
            .into_iter()
            .map(|n| self.to_point(n))
            .collect())
    }

    fn child_nodes(&self, id: ClusterId) -> Result<Vec<&Node>> {
        let origin_zoom = id.origin_zoom();
        if origin_zoom <= self.options.min_zoom || origin_zoom > self.options.max_zoom + 1 {
            return Err(AtlasError::UnknownCluster(id.as_u64()));
        }

        let level = self.level(origin_zoom);
        let origin = level
            .nodes
            .get(id.origin_index())
            .filter(|n| n.parent == Some(id))
            .ok_or(AtlasError::UnknownCluster(id.as_u64()))?;

        let radius =
            self.options.radius / (self.options.extent * 2f64.powi(origin_zoom as i32 - 1));

        Ok(level
            .within(origin.x, origin.y, radius)
            .into_iter()
            .map(|j| &level.nodes[j])
            .filter(|n| n.parent == Some(id))
            .collect())
    }

    /// 點擊聚合點後要放大到的層級：最小的、能把它拆成至少兩個標記的層級，上限 `max_zoom`
    pub fn expansion_zoom(&self, id: ClusterId) -> Result<u8> {
        let mut expansion = id.origin_zoom().saturating_sub(1);
        let mut current = id;

        while expansion <= self.options.max_zoom {
            let children = self.children(current)?;
            expansion += 1;
            match children.as_slice() {
                [ClusterPoint::Cluster { id, .. }] => current = *id,
                _ => break,
            }
        }

        Ok(expansion.min(self.options.max_zoom))
    }

    /// 聚合點底下的房屋 id，支援分頁
    pub fn leaves(&self, id: ClusterId, limit: usize, offset: usize) -> Result<Vec<&str>> {
        let mut out = Vec::new();
        let mut skipped = 0;
        self.collect_leaves(id, limit, offset, &mut skipped, &mut out)?;
        Ok(out)
    }

    fn collect_leaves<'a>(
        &'a self,
        id: ClusterId,
        limit: usize,
        offset: usize,
        skipped: &mut usize,
        out: &mut Vec<&'a str>,
    ) -> Result<()> {
        for child in self.child_nodes(id)? {
            if out.len() >= limit {
                break;
            }
            match child.source {
                NodeSource::Cluster(child_id) => {
                    if *skipped + child.count <= offset {
                        *skipped += child.count;
                    } else {
                        self.collect_leaves(child_id, limit, offset, skipped, out)?;
                    }
                }
                NodeSource::Leaf(i) => {
                    if *skipped < offset {
                        *skipped += 1;
                    } else {
                        out.push(self.leaves[i].house_id.as_str());
                    }
                }
            }
        }
        Ok(())
    }

    fn level(&self, zoom: u8) -> &Level {
        &self.levels[(zoom - self.options.min_zoom) as usize]
    }

    fn to_point(&self, node: &Node) -> ClusterPoint {
        match node.source {
            NodeSource::Leaf(i) => {
                let leaf = &self.leaves[i];
                ClusterPoint::Leaf {
                    house_id: leaf.house_id.clone(),
                    longitude: leaf.longitude,
                    latitude: leaf.latitude,
                }
            }
            NodeSource::Cluster(id) => ClusterPoint::Cluster {
                id,
                longitude: x_lng(node.x),
                latitude: y_lat(node.y),
                count: node.count,
            },
        }
    }
}

fn normalize_lng(lng: f64) -> f64 {
    ((lng + 180.0) % 360.0 + 360.0) % 360.0 - 180.0
}

// Web Mercator 投影到 [0, 1] 正方形
pub(crate) fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

pub(crate) fn lat_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

pub(crate) fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

pub(crate) fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}
