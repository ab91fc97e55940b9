//! Binary entry point: CLI parsing, logger setup, and process exit
//! codes.

use clap::Parser;

use evhttpd::config::{Args, Config};
use evhttpd::error::ServerError;
use evhttpd::server::Server;

fn main() {
    env_logger::init();

    let args = Args::parse();

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(exit_code(&e));
        }
    };

    let mut server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(exit_code(&e));
        }
    };

    if let Err(e) = server.run() {
        log::error!("event loop terminated: {}", e);
        std::process::exit(3);
    }
}

fn exit_code(err: &ServerError) -> i32 {
    match err {
        ServerError::Startup(_) => 1,
        ServerError::DocumentRootInvalid(_) => 2,
        ServerError::BindFailed(_) => 3,
        _ => 1,
    }
}
