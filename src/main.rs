use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, LevelFilter};

mod args;
use args::Args;

mod auth;
mod backend;
mod cardio;
mod features;
mod model;
mod prediction;
mod routes;
mod time;
mod user;
mod views;

use backend::Backend;
use cardio::CardioRisk;
use model::Forest;

#[tokio::main]
async fn main() -> ExitCode {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let addr = match args.addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("invalid address: {e}");
            return ExitCode::FAILURE;
        }
    };

    // no model, no service
    let model = match Forest::load(args.model()) {
        Ok(model) => model,
        Err(e) => {
            error!("{}: {e}", args.model().display());
            return ExitCode::FAILURE;
        }
    };

    let backend = match Backend::new(args.data_dir()).await {
        Ok(backend) => backend,
        Err(e) => {
            error!("couldn't open database in {}: {e}", args.data_dir().display());
            return ExitCode::FAILURE;
        }
    };

    let app = Arc::new(CardioRisk::new(backend, model));
    let routes = routes::routes(app, args.secure());

    info!("listening on {addr}");
    warp::serve(routes).run(addr).await;

    ExitCode::SUCCESS
}
