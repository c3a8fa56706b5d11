use std::process;
use std::sync::Arc;

use log::{error, info, warn};
use pingora_core::apps::http_app::HttpServer;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use pingora_core::services::background::background_service;
use pingora_core::services::listening::Service;
use structopt::StructOpt;

mod backend;
mod config;
mod error;
mod forwarder;
mod heartbeat;
mod metrics;
mod probe;
mod refresh;
mod scoring;
mod selector;
mod service;

use config::Config;
use heartbeat::Heartbeat;
use probe::MetricsProber;
use refresh::RefreshLoop;
use selector::Selector;
use service::BalancerApp;

#[derive(StructOpt, Debug)]
#[structopt(name = "pingora-bestapi")]
struct Args {
    #[structopt(short = "p", long = "port")]
    proxy_port: Option<u16>,

    #[structopt(short = "c", long = "conf", help = "Path to configuration file")]
    conf: Option<String>,
}

fn main() {
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = dotenv {
        warn!("⚠️ Error loading .env file: {}", e);
    }

    let args = Args::from_args();

    let config = match Config::from_env(args.proxy_port) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ {}", e);
            process::exit(1);
        }
    };

    let prober = match MetricsProber::new(config.probe_timeout) {
        Ok(prober) => prober,
        Err(e) => {
            error!("❌ {}", e);
            process::exit(1);
        }
    };

    let server_opt = args.conf.map(|conf_path| Opt {
        upgrade: false,
        daemon: false,
        nocapture: false,
        test: false,
        conf: Some(conf_path),
    });

    let mut my_server = match Server::new(server_opt) {
        Ok(server) => server,
        Err(e) => {
            error!("❌ Failed to create server: {}", e);
            process::exit(1);
        }
    };
    my_server.bootstrap();

    let selector = Arc::new(Selector::new());

    info!("📋 Backends:");
    for backend in &config.backends {
        info!("   - {}", backend.url);
    }
    let refresh = RefreshLoop::new(
        config.backends.clone(),
        prober,
        selector.clone(),
        config.metrics_interval,
    );
    my_server.add_service(background_service("best api refresh", refresh));

    if let Some(api) = &config.loadbalancer_api {
        let heartbeat = Heartbeat::new(api, config.health_check_interval);
        my_server.add_service(background_service("loadbalancer heartbeat", heartbeat));
    }

    let mut http_service = Service::new(
        "Best API Load Balancer".to_string(),
        HttpServer::new_app(BalancerApp::new(selector)),
    );

    let addr = format!("0.0.0.0:{}", config.proxy_port);
    if config.ssl.enabled {
        if !std::path::Path::new(&config.ssl.cert).exists() {
            error!("❌ SSL certificate not found: {}", config.ssl.cert);
            process::exit(1);
        }
        if !std::path::Path::new(&config.ssl.key).exists() {
            error!("❌ SSL private key not found: {}", config.ssl.key);
            process::exit(1);
        }

        info!("🔒 SSL/TLS enabled");
        if let Err(e) = http_service.add_tls(&addr, &config.ssl.cert, &config.ssl.key) {
            warn!("⚠️ SSL configuration failed, falling back to HTTP: {}", e);
            http_service.add_tcp(&addr);
        }
    } else {
        info!("🔓 SSL/TLS disabled - using HTTP");
        http_service.add_tcp(&addr);
    }

    my_server.add_service(http_service);

    info!("🚀 Starting load balancer on {}", addr);
    my_server.run_forever();
}
