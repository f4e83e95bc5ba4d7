use crate::core::cluster::{lat_y, lng_x, x_lng, y_lat, BBox, MAX_SUPPORTED_ZOOM};

pub const DEFAULT_TILE_SIZE: f64 = 512.0;

/// 縮放限制在 `[0, 30]`；非有限值沿用 `fallback`
fn clamp_zoom(zoom: f64, fallback: f64) -> f64 {
    if zoom.is_finite() {
        zoom.clamp(0.0, MAX_SUPPORTED_ZOOM as f64)
    } else {
        fallback
    }
}

/// 地圖目前的中心、縮放與畫面大小 (像素)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    pub width: u32,
    pub height: u32,
    pub tile_size: f64,
}

impl Viewport {
    pub fn new(latitude: f64, longitude: f64, zoom: f64, width: u32, height: u32) -> Self {
        Self {
            latitude,
            longitude,
            zoom: clamp_zoom(zoom, 0.0),
            width,
            height,
            tile_size: DEFAULT_TILE_SIZE,
        }
    }

    /// 以 Web Mercator 推算目前畫面涵蓋的經緯度範圍
    pub fn bounds(&self) -> BBox {
        let world = self.tile_size * 2f64.powf(self.zoom);
        let cx = lng_x(self.longitude) * world;
        let cy = lat_y(self.latitude) * world;
        let half_w = self.width as f64 / 2.0;
        let half_h = self.height as f64 / 2.0;

        BBox::new(
            x_lng((cx - half_w) / world),
            y_lat(((cy + half_h) / world).clamp(0.0, 1.0)),
            x_lng((cx + half_w) / world),
            y_lat(((cy - half_h) / world).clamp(0.0, 1.0)),
        )
    }

    pub fn recenter(&mut self, latitude: f64, longitude: f64, zoom: f64) {
        self.latitude = latitude;
        self.longitude = longitude;
        self.zoom = clamp_zoom(zoom, self.zoom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contain_center() {
        let viewport = Viewport::new(55.7558, 37.6173, 10.0, 1024, 768);
        let b = viewport.bounds();
        assert!(b.west < 37.6173 && 37.6173 < b.east);
        assert!(b.south < 55.7558 && 55.7558 < b.north);
    }

    #[test]
    fn test_bounds_shrink_when_zooming_in() {
        let mut viewport = Viewport::new(55.7558, 37.6173, 10.0, 1024, 768);
        let wide = viewport.bounds();
        viewport.recenter(55.7558, 37.6173, 14.0);
        let narrow = viewport.bounds();
        assert!(narrow.east - narrow.west < wide.east - wide.west);
        assert!(((wide.east - wide.west) / (narrow.east - narrow.west) - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_extreme_zoom_keeps_bounds_finite() {
        let mut viewport = Viewport::new(55.7558, 37.6173, 10.0, 1024, 768);
        viewport.recenter(55.7558, 37.6173, 2000.0);
        assert_eq!(viewport.zoom, 30.0);
        let b = viewport.bounds();
        for edge in [b.west, b.south, b.east, b.north] {
            assert!(edge.is_finite());
        }
        assert!(b.west <= 37.6173 && 37.6173 <= b.east);

        viewport.recenter(55.7558, 37.6173, f64::NAN);
        assert_eq!(viewport.zoom, 30.0);
        viewport.recenter(55.7558, 37.6173, -4.0);
        assert_eq!(viewport.zoom, 0.0);
    }

    #[test]
    fn test_world_view_spans_full_longitude() {
        let viewport = Viewport::new(0.0, 0.0, 0.0, 2048, 2048);
        let b = viewport.bounds();
        assert!(b.east - b.west >= 360.0);
        assert!((b.north - 85.0511).abs() < 1e-3);
    }
}
