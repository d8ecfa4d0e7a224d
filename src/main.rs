use apitrail::configuration::config::{CliArgs, Config};
use apitrail::controller::controller_handler::Controller;
use clap::Parser;
use log::{error, info};

fn main() {
    // https://docs.rs/env_logger/latest/env_logger/
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = CliArgs::parse();

    info!("Importing configuration");
    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration imported successfully");

    // storage backends are built before the server runtime exists
    let controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Unable to start the async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(controller.run()) {
        error!("Error occurred in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}
