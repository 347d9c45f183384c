use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use educonnect::{api, config::ModelConfig, db, flows::Flows};

#[derive(Parser)]
#[command(name = "educonnect")]
#[command(about = "Curriculum, grading, scheduling and AI tutoring API")]
struct Cli {
    /// SQLite database file (default: platform data directory)
    #[arg(long, global = true, env = "EDUCONNECT_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,

    // Server settings used when no subcommand is given
    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "EDUCONNECT_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port for HTTP API
    #[arg(short, long, env = "EDUCONNECT_PORT", default_value = "3000")]
    port: u16,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve(ServeArgs),
    /// Apply pending schema migrations and exit
    Migrate,
    /// Import the bundled seed curriculum and exit
    Seed,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "educonnect=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<db::Database> {
    let database = match path {
        Some(path) => db::Database::open(path)?,
        None => db::Database::open_default()?,
    };
    database.migrate()?;
    Ok(database)
}

async fn serve(database: db::Database, args: ServeArgs) -> anyhow::Result<()> {
    let flows = Flows::from_config(&ModelConfig::from_env())?;
    let app = api::create_router(api::AppState::new(database, flows));

    let listener = tokio::net::TcpListener::bind((args.host, args.port)).await?;
    tracing::info!("EduConnect listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let database = open_database(cli.db)?;

    // Default: serve
    match cli.command.unwrap_or(Commands::Serve(cli.serve)) {
        Commands::Serve(args) => serve(database, args).await?,
        Commands::Migrate => {
            tracing::info!("Database schema is up to date");
        }
        Commands::Seed => {
            let report = database.import_curriculum(&db::seed_curriculum()?)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_flags_serve_without_subcommand() {
        let cli = Cli::try_parse_from(["educonnect", "--port", "4000"]).unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.serve.port, 4000);
        assert_eq!(cli.serve.host, IpAddr::from([127, 0, 0, 1]));
    }

    #[test]
    fn serve_subcommand_takes_its_own_flags() {
        let cli = Cli::try_parse_from(["educonnect", "serve", "--host", "0.0.0.0"]).unwrap();

        match cli.command {
            Some(Commands::Serve(args)) => {
                assert_eq!(args.host, IpAddr::from([0, 0, 0, 0]));
                assert_eq!(args.port, 3000);
            }
            _ => panic!("expected serve"),
        }
    }
}
