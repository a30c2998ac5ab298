use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::runtime::TokioCurrentThread;
use paperclip::actix::OpenApiExt;
use tracing_actix_web::TracingLogger;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use bookshelf_repository::app_config::{config_app, json_config, query_config};
use bookshelf_repository::book_service::BookService;
use bookshelf_repository::books_repository::{
    BookRepository, InMemoryBookRepository, PostgresBooksRepository,
};
use bookshelf_repository::settings::AppSettings;

// Based on https://github.com/LukeMathWalker/tracing-actix-web/blob/main/examples/opentelemetry/src/main.rs#L15
fn init_telemetry(jaeger_enabled: bool) -> anyhow::Result<()> {
    let app_name = "bookshelf_repository";

    // Filter based on level - trace, debug, info, warn, error
    // Tunable via `RUST_LOG` env variable
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info"));

    // Spans are exported to Jaeger in batch only when enabled
    let telemetry = if jaeger_enabled {
        global::set_text_map_propagator(TraceContextPropagator::new());
        #[allow(deprecated)]
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name(app_name)
            .install_batch(TokioCurrentThread)
            .context("Failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    // Emit spans as structured logs to stdout
    let formatting_layer = BunyanFormattingLayer::new(app_name.into(), std::io::stdout);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(telemetry)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install `tracing` subscriber")
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = AppSettings::load()?;
    init_telemetry(settings.jaeger_enabled)?;

    let books_repository: Arc<dyn BookRepository + Send + Sync> = if settings.use_in_memory_db {
        tracing::info!("Using in-memory books repository");
        Arc::new(InMemoryBookRepository::default())
    } else {
        Arc::new(
            PostgresBooksRepository::init(settings.postgres_config())
                .await
                .context("Failed to init postgres")?,
        )
    };
    let book_service = BookService::new(books_repository);

    tracing::info!(
        "Starting HTTP server at http://{}:{}",
        settings.http_host,
        settings.http_port
    );
    HttpServer::new(move || {
        App::new()
            .wrap_api()
            .app_data(Data::new(book_service.clone()))
            .app_data(json_config())
            .app_data(query_config())
            .wrap(NormalizePath::trim())
            .wrap(TracingLogger::default())
            .configure(config_app)
            .with_json_spec_at("/apispec/v2")
            .build()
    })
    .bind((settings.http_host.as_str(), settings.http_port))?
    .run()
    .await?;

    opentelemetry::global::shutdown_tracer_provider();
    Ok(())
}
