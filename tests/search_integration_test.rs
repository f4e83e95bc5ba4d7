use anyhow::Result;
use house_atlas::utils::error::AtlasError;
use house_atlas::{BackendClient, SearchSession, PAGE_SIZE};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn client_for(server: &MockServer) -> Result<Arc<BackendClient>> {
    Ok(Arc::new(BackendClient::new(
        &server.base_url(),
        Duration::from_secs(5),
    )?))
}

fn listing(id: usize, adm_area: &str, rating: &str, with_review: bool) -> Value {
    let reviews = if with_review {
        json!([{
            "id": format!("r{}", id),
            "house_id": format!("h{}", id),
            "user_id": "u1",
            "rating": 5,
            "review_text": "Тихий двор",
            "is_published": true,
            "is_deleted": false,
            "created_at": "2024-03-01T10:00:00Z",
            "modified_at": "2024-03-01T10:00:00Z"
        }])
    } else {
        json!([])
    };

    json!({
        "id": format!("h{}", id),
        "simple_address": format!("ул. Садовая, {}", id),
        "adm_area": adm_area,
        "district": "Арбат",
        "rating": rating,
        "rating_count": if with_review { 1 } else { 0 },
        "latitude": 55.75,
        "longitude": 37.61,
        "reviews": reviews
    })
}

/// 12 間房屋：前 4 間在 ЦАО 且有評論
fn twelve_listings() -> Value {
    Value::Array(
        (1..=12)
            .map(|i| {
                let area = if i <= 4 { "ЦАО" } else { "САО" };
                let rating = if i % 2 == 0 { "4.50" } else { "3.00" };
                listing(i, area, rating, i <= 4)
            })
            .collect(),
    )
}

#[tokio::test]
async fn test_search_paginates_and_filters_backend_results() -> Result<()> {
    let server = MockServer::start();
    let search_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/houses/search")
            .query_param("query", "Садовая");
        then.status(200).json_body(twelve_listings());
    });

    let mut session = SearchSession::new(client_for(&server)?);
    let view = session.subscribe();

    assert!(session.search("  Садовая ").await);
    search_mock.assert();

    {
        let snapshot = view.borrow();
        assert!(snapshot.has_searched);
        assert!(!snapshot.loading);
        assert_eq!(snapshot.total, 12);
        assert_eq!(snapshot.total_pages, 2);
        assert_eq!(snapshot.page, 1);
        assert_eq!(snapshot.items.len(), PAGE_SIZE);
        assert_eq!(snapshot.items[0].id, "h1");
        assert!(snapshot.error.is_none());
    }

    session.go_to_page(2)?;
    {
        let snapshot = view.borrow();
        assert_eq!(snapshot.page, 2);
        let ids: Vec<&str> = snapshot.items.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["h11", "h12"]);
    }

    // 篩選條件一變就回到第一頁
    session.set_adm_area(Some("ЦАО".to_string()));
    assert_eq!(view.borrow().page, 1);
    assert_eq!(view.borrow().total, 4);

    session.set_min_rating(4.0)?;
    let ids: Vec<String> = view.borrow().items.iter().map(|h| h.id.clone()).collect();
    assert_eq!(ids, vec!["h2", "h4"]);

    assert!(matches!(
        session.go_to_page(2),
        Err(AtlasError::PageOutOfRange { page: 2, total_pages: 1 })
    ));

    Ok(())
}

#[tokio::test]
async fn test_failed_search_publishes_empty_result() -> Result<()> {
    let server = MockServer::start();
    let search_mock = server.mock(|when, then| {
        when.method(GET).path("/houses/search");
        then.status(500).body("boom");
    });

    let mut session = SearchSession::new(client_for(&server)?);
    let view = session.subscribe();

    assert!(session.search("Садовая").await);
    search_mock.assert();

    let snapshot = view.borrow();
    assert!(snapshot.has_searched);
    assert!(!snapshot.loading);
    assert_eq!(snapshot.total, 0);
    assert_eq!(snapshot.total_pages, 0);
    assert_eq!(snapshot.page, 1);
    assert!(snapshot.items.is_empty());
    assert!(snapshot.error.is_some());
    assert!(session.listings().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_blank_query_is_not_sent() -> Result<()> {
    let server = MockServer::start();
    let search_mock = server.mock(|when, then| {
        when.method(GET).path("/houses/search");
        then.status(200).json_body(json!([]));
    });

    let mut session = SearchSession::new(client_for(&server)?);
    assert!(!session.search("   ").await);
    assert!(!session.subscribe().borrow().has_searched);
    search_mock.assert_hits(0);

    Ok(())
}

#[tokio::test]
async fn test_filter_options_are_sorted_and_deduplicated() -> Result<()> {
    let server = MockServer::start();
    let areas_mock = server.mock(|when, then| {
        when.method(GET).path("/adm_areas");
        then.status(200).json_body(json!([
            { "name": "САО" },
            { "name": "ЦАО" },
            { "name": "ВАО" },
            { "name": "ЦАО" }
        ]));
    });
    let districts_mock = server.mock(|when, then| {
        when.method(GET).path("/districts");
        then.status(200).json_body(json!([
            { "name": "Тверской" },
            { "name": "Арбат" },
            { "name": " " }
        ]));
    });

    let mut session = SearchSession::new(client_for(&server)?);
    let options = session.load_filter_options().await?;

    assert_eq!(options.adm_areas, vec!["ВАО", "САО", "ЦАО"]);
    assert_eq!(options.districts, vec!["Арбат", "Тверской"]);
    areas_mock.assert();
    districts_mock.assert();

    Ok(())
}

#[tokio::test]
async fn test_house_detail_hides_unpublished_reviews() -> Result<()> {
    use house_atlas::core::ListingSource;

    let server = MockServer::start();
    let house_mock = server.mock(|when, then| {
        when.method(GET).path("/house/h1");
        then.status(200).json_body(json!({
            "id": "h1",
            "simple_address": "ул. Садовая, 1",
            "adm_area": "ЦАО",
            "district": "Арбат",
            "rating": "4.00",
            "rating_count": "3",
            "latitude": 55.75,
            "longitude": 37.61,
            "reviews": [
                {
                    "id": "r1", "house_id": "h1", "user_id": "u1", "rating": 5,
                    "review_text": "Отлично", "is_published": true, "is_deleted": false,
                    "created_at": "2024-03-01T10:00:00Z", "modified_at": "2024-03-01T10:00:00Z"
                },
                {
                    "id": "r2", "house_id": "h1", "user_id": "u2", "rating": 3,
                    "review_text": "Нормально", "is_published": true, "is_deleted": false,
                    "created_at": "2024-03-02T10:00:00Z", "modified_at": "2024-03-02T10:00:00Z"
                },
                {
                    "id": "r3", "house_id": "h1", "user_id": "u3", "rating": 1,
                    "review_text": "Ждёт модерации", "is_published": false, "is_deleted": false,
                    "created_at": "2024-03-03T10:00:00Z", "modified_at": "2024-03-03T10:00:00Z"
                }
            ]
        }));
    });

    let client = client_for(&server)?;
    let house = client.house_by_id("h1").await?;
    house_mock.assert();

    assert_eq!(house.rating_count, 3);
    assert_eq!(house.rating_value(), Some(4.0));
    assert_eq!(house.visible_reviews().count(), 2);
    assert_eq!(house.visible_average_rating(), Some(4.0));

    Ok(())
}

#[tokio::test]
async fn test_missing_house_maps_to_http_status() -> Result<()> {
    use house_atlas::core::ListingSource;

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/house/missing");
        then.status(404);
    });

    let client = client_for(&server)?;
    match client.house_by_id("missing").await {
        Err(AtlasError::HttpStatus { status, url }) => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/house/missing"));
        }
        other => panic!("unexpected result {:?}", other.map(|h| h.id)),
    }

    Ok(())
}
