use actix_web::{middleware::Compress, web, App, HttpResponse, HttpServer};
use actix_cors::Cors;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use ideahub::config::AppConfig;
use ideahub::openapi::ApiDoc;
use ideahub::rate_limit::{InMemoryRateLimiter, RateLimiterFacade};
use ideahub::repo::Repo;
use ideahub::storage::build_asset_store;
use ideahub::{config, AppState, Engine};

async fn render_metrics(handle: web::Data<PrometheusHandle>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(handle.render())
}

fn io_err(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo() -> std::io::Result<Arc<dyn Repo>> {
    use ideahub::repo::inmem::InMemRepo;
    info!("Using in-memory repository backend");
    Ok(Arc::new(InMemRepo::new().map_err(io_err)?))
}

#[cfg(feature = "postgres-store")]
async fn build_repo() -> std::io::Result<Arc<dyn Repo>> {
    use ideahub::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;
    let db_url = std::env::var("DATABASE_URL").map_err(|_| io_err("DATABASE_URL must be set for postgres-store"))?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await
        .map_err(io_err)?;
    sqlx::migrate!("./migrations").run(&pool).await.map_err(io_err)?;
    info!("Using Postgres repository backend (migrations applied)");
    Ok(Arc::new(PgRepo::new(pool)))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    // Structured logging initialisation
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("invalid configuration: {e}");
            eprintln!("{e}\nPlease copy .env.example to .env and configure it");
            std::process::exit(1);
        }
    };

    info!("Bootstrapping IdeaHub server");
    info!("Frontend URL: {}", cfg.frontend_url);
    info!("Bootstrap moderators: {}", cfg.bootstrap_moderators.len());

    let metrics = PrometheusBuilder::new().install_recorder().map_err(io_err)?;

    let engine = Engine::new(build_repo().await?);
    let assets = build_asset_store(&cfg).await.map_err(io_err)?;
    info!(backend = ?cfg.asset_backend, "asset store ready");

    let mut state = AppState::new(engine, assets).with_bootstrap_moderators(cfg.bootstrap_moderators.clone());
    if cfg.rate_limit_enabled {
        state = state.with_rate_limiter(RateLimiterFacade::new(InMemoryRateLimiter::new(true), cfg.rate_limits.clone()));
    } else {
        info!("Rate limiting disabled");
    }

    let openapi = ApiDoc::openapi();
    info!("OpenAPI document generated");

    let frontend = cfg.frontend_url.clone();
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend)
            // during local dev allow the Vite default port
            .allowed_origin("http://localhost:5173")
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .configure(config)
            .route("/metrics", web::get().to(render_metrics))
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(cfg.bind_addr.as_str())?;

    info!("Listening on http://{}", cfg.bind_addr);

    server.run().await
}
