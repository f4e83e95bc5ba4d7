use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use reqwest::Url;
use std::sync::{Arc, PoisonError, RwLock};

/// 可清空的 cookie jar；登出時整個換掉
#[derive(Default)]
pub struct SessionCookies {
    jar: RwLock<Arc<Jar>>,
}

impl SessionCookies {
    fn current(&self) -> Arc<Jar> {
        self.jar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        *self.jar.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Jar::default());
    }

    pub fn has_cookies_for(&self, url: &Url) -> bool {
        self.cookies(url).is_some()
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.current().set_cookies(cookie_headers, url)
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.current().cookies(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_drops_cookies() {
        let store = SessionCookies::default();
        let url: Url = "http://localhost:5001/login".parse().unwrap();
        let header = HeaderValue::from_static("Authorization=Bearer abc; Path=/");
        store.set_cookies(&mut std::iter::once(&header), &url);
        assert!(store.has_cookies_for(&url));

        store.clear();
        assert!(!store.has_cookies_for(&url));
    }
}
