use clap::Parser;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, DatabaseConnection};

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = settings::Args::parse();
    let settings = settings::Settings::new(&args)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "transfers={level},server={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let engine = engine::Engine::builder()
        .database(db)
        .strategy(settings.engine.strategy)
        .retry_policy(settings.engine.retry_policy())
        .build();

    let listener =
        tokio::net::TcpListener::bind((settings.server.bind.as_str(), settings.server.port))
            .await?;
    server::run_with_listener(engine, listener).await?;

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let mut options = ConnectOptions::new(config.url.as_str());
    if let Some(max) = config.max_connections {
        options.max_connections(max);
    }
    options.sqlx_logging(false);

    let database = sea_orm::Database::connect(options).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database ready");
    Ok(database)
}
