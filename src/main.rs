use clap::Parser;
use house_atlas::config::cli::Command;
use house_atlas::core::filter::sorted_names;
use house_atlas::core::ListingSource;
use house_atlas::utils::error::ErrorCategory;
use house_atlas::utils::logger;
use house_atlas::{
    AppConfig, AuthSession, BackendClient, CliConfig, ClusterId, ClusterPoint, HouseListing,
    MapSession, SearchSession,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 驗證配置
    let config = match cli.load_app_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if config.logging.format == "json" {
        logger::init_json_logger(&config.logging.level, cli.verbose);
    } else {
        logger::init_cli_logger(&config.logging.level, cli.verbose);
    }

    tracing::info!("Starting house-atlas CLI");
    tracing::debug!("Backend: {}", config.backend.base_url);

    let client = Arc::new(BackendClient::from_config(&config.backend)?);

    if let Err(e) = run(cli.command, &config, client).await {
        tracing::error!("❌ Command failed: {} (Category: {:?})", e, e.category());
        eprintln!("❌ {}", e.user_friendly_message());

        let exit_code = match e.category() {
            ErrorCategory::Configuration => 1,
            ErrorCategory::Input => 2,
            ErrorCategory::Network => 3,
            ErrorCategory::Authentication => 4,
            ErrorCategory::Internal => 5,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run(
    command: Command,
    config: &AppConfig,
    client: Arc<BackendClient>,
) -> house_atlas::Result<()> {
    match command {
        Command::Search {
            query,
            adm_area,
            district,
            min_rating,
            has_reviews,
            page,
        } => {
            let mut session = SearchSession::new(client);
            session.search(&query).await;
            session.set_adm_area(adm_area);
            session.set_district(district);
            session.set_min_rating(min_rating)?;
            session.set_has_reviews(has_reviews);
            session.go_to_page(page)?;

            let view = session.subscribe().borrow().clone();
            if let Some(error) = &view.error {
                eprintln!("⚠️  {}", error);
            }
            println!(
                "Found {} houses (page {}/{})",
                view.total,
                view.page,
                view.total_pages.max(1)
            );
            for house in &view.items {
                print_listing(house);
            }
        }
        Command::Map {
            query,
            lat,
            lng,
            zoom,
            expand,
        } => {
            let mut viewport = config.map.initial_viewport();
            viewport.recenter(
                lat.unwrap_or(viewport.latitude),
                lng.unwrap_or(viewport.longitude),
                zoom.unwrap_or(viewport.zoom),
            );

            let mut session = MapSession::new(client, config.map.cluster_options(), viewport)?;
            session.search(&query).await;

            if let Some(id) = expand {
                let zoom = session.click_cluster(ClusterId::from_u64(id))?;
                println!("🔎 Expanded cluster {} to zoom {}", id, zoom);
            }

            let viewport = session.viewport();
            println!(
                "{} markers at zoom {:.1} around ({:.5}, {:.5})",
                session.points().len(),
                viewport.zoom,
                viewport.latitude,
                viewport.longitude
            );
            for point in session.points() {
                match point {
                    ClusterPoint::Cluster {
                        id,
                        latitude,
                        longitude,
                        count,
                    } => println!("  [cluster {}] {} houses at ({:.5}, {:.5})", id, count, latitude, longitude),
                    ClusterPoint::Leaf {
                        house_id,
                        latitude,
                        longitude,
                    } => println!("  [house {}] ({:.5}, {:.5})", house_id, latitude, longitude),
                }
            }
        }
        Command::House { id } => {
            let house = client.house_by_id(&id).await?;
            print_listing(&house);
            if let Some(avg) = house.visible_average_rating() {
                println!("  Average of published reviews: {:.1}", avg);
            }
            for review in house.visible_reviews() {
                println!(
                    "  ★{} {} ({})",
                    review.rating,
                    review.review_text,
                    review.created_at.format("%Y-%m-%d")
                );
            }
        }
        Command::Areas => {
            for name in sorted_names(client.adm_areas().await?) {
                println!("{}", name);
            }
        }
        Command::Districts => {
            for name in sorted_names(client.districts().await?) {
                println!("{}", name);
            }
        }
        Command::Whoami { username, password } => {
            let mut auth = AuthSession::new(client);
            auth.initialize().await;
            let user = auth.login(&username, &password).await?;
            println!("✅ {} ({:?})", user.username, user.role());
        }
    }

    Ok(())
}

fn print_listing(house: &HouseListing) {
    let rating = house
        .rating_value()
        .map(|r| format!("★{:.1}", r))
        .unwrap_or_else(|| "no rating".to_string());
    println!(
        "{} | {} | {} / {} | {} | {} reviews",
        house.id,
        house.simple_address,
        house.adm_area,
        house.district,
        rating,
        house.rating_count
    );
}
