use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::{error, info};
use warp::Filter;

mod certificate;
mod config;
mod progress;
mod routes;

use config::Config;
use db::{new_db, seed::seed_db, Database};
use filters::IDENTITY_HEADER;
use routes::{handle_rejection, routes};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(err) = setup_logging(config.verbose) {
        eprintln!("Could not apply logging configuration: {}", err);
        std::process::exit(1);
    }

    let global_db = match new_db(&config.db_path) {
        Ok(db) => db,
        Err(err) => {
            error!("Could not open the store: {}", err);
            std::process::exit(1);
        }
    };

    if config.seed {
        let mut db = global_db.lock().await;

        if db.is_empty() {
            if let Err(err) = seed_db(&mut *db) {
                error!("Could not seed the store: {}", err);
                std::process::exit(1);
            }
            info!("Seeded the store with demo data");
        } else {
            info!("Store already holds data, not seeding");
        }
    }

    let filters = routes(&global_db);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PATCH", "DELETE"])
        .allow_headers(vec!["content-type", IDENTITY_HEADER]);

    let filters = filters
        .with(cors)
        // Before logging for correct status codes
        .recover(handle_rejection)
        .with(warp::log("learnly"));

    info!("Listening on {}:{}", config.address, config.port);
    warp::serve(filters)
        .run((config.address, config.port))
        .await;
}

fn setup_logging(verbose: bool) -> Result<(), log::SetLoggerError> {
    let colors = ColoredLevelConfig::new().debug(Color::Magenta);
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}{} {}",
                colors.color(record.level()),
                chrono::Local::now().format("[%H:%M:%S]"),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
}
