mod browser;
mod compression;
mod config;
mod dispatcher;
mod logger;
mod network;
mod resolver;
mod shutdown;
mod tls;

use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    middleware::DefaultHeaders,
    web, App, Error, HttpServer,
};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use futures_util::future::LocalBoxFuture;
use std::env;
use std::process::exit;
use std::time::Instant;

use crate::compression::CompressionCache;
use crate::config::{ConfigLoader, Configuration, Settings};
use crate::dispatcher::{verify_root_document, Dispatcher};
use crate::network::{NetworkUtils, BIND_HOST};

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

// Access log middleware: one line per request with status and latency
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestLoggerMiddleware<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequestLoggerMiddleware { service }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();

        let method = req.method().to_string();
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.path().to_string());
        let client_ip = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            logger::get_logger().http(
                &client_ip,
                &method,
                &target,
                res.status().as_u16(),
                start_time.elapsed().as_millis(),
            );
            Ok(res)
        })
    }
}

fn build_cli() -> Command {
    Command::new(PKG_NAME)
        .version(PKG_VERSION)
        .about("Serve a single-page application with client-side routing fallback")
        .long_about(
            "Serves a built single-page application. Requests that do not match a file are \
             answered with index.html so the client-side router can handle them. Top-level \
             text assets are gzip-compressed once at startup.",
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(value_parser!(u16).range(1..))
                .help("Port number to serve on [default: 8080]"),
        )
        .arg(
            Arg::new("path")
                .long("path")
                .value_name("DIR")
                .help("Directory containing the built application (defaults to current directory)"),
        )
        .arg(
            Arg::new("base-href")
                .long("base-href")
                .alias("baseHref")
                .value_name("PREFIX")
                .help("URL prefix the application is mounted under, stripped before file lookup"),
        )
        .arg(
            Arg::new("cors")
                .long("cors")
                .action(ArgAction::SetTrue)
                .help("Send CORS headers and answer OPTIONS preflight requests"),
        )
        .arg(
            Arg::new("cache")
                .long("cache")
                .action(ArgAction::SetTrue)
                .help("Send 30-day Cache-Control and Expires headers"),
        )
        .arg(
            Arg::new("ssl")
                .long("ssl")
                .alias("https")
                .action(ArgAction::SetTrue)
                .help("Serve over HTTPS (self-signed certificate unless --cert and --key are given)"),
        )
        .arg(
            Arg::new("key")
                .long("key")
                .value_name("FILE")
                .help("Path to the PEM private key (requires --cert)"),
        )
        .arg(
            Arg::new("cert")
                .long("cert")
                .value_name("FILE")
                .help("Path to the PEM certificate chain (requires --key)"),
        )
        .arg(
            Arg::new("open")
                .short('o')
                .long("open")
                .action(ArgAction::SetTrue)
                .help("Open the application in the default browser once listening"),
        )
        .arg(
            Arg::new("silent")
                .long("silent")
                .action(ArgAction::SetTrue)
                .help("Only print warnings and errors"),
        )
        .arg(
            Arg::new("no-timestamps")
                .short('T')
                .long("no-timestamps")
                .action(ArgAction::SetTrue)
                .help("Disable timestamps in log messages"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a JSON configuration file"),
        )
}

/// Command line values as the highest-precedence configuration layer.
fn cli_configuration(matches: &ArgMatches) -> Configuration {
    let string = |id: &str| matches.get_one::<String>(id).cloned();

    Configuration {
        port: matches.get_one::<u16>("port").copied(),
        path: string("path"),
        base_href: string("base-href"),
        cors: matches.get_flag("cors"),
        cache: matches.get_flag("cache"),
        ssl: matches.get_flag("ssl"),
        https: false,
        key: string("key"),
        cert: string("cert"),
        open: matches.get_flag("open"),
        silent: matches.get_flag("silent"),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let matches = build_cli().get_matches();

    let current_dir = env::current_dir()?;
    let custom_config = matches.get_one::<String>("config").map(String::as_str);
    let file_configuration = match ConfigLoader::new(current_dir.clone()).load_configuration(custom_config) {
        Ok(config) => config,
        Err(e) => {
            log_error!("Configuration error: {}", e);
            exit(1);
        }
    };

    let settings = match Settings::resolve(
        cli_configuration(&matches).merge(file_configuration),
        &current_dir,
    ) {
        Ok(settings) => settings,
        Err(e) => {
            log_error!("Configuration error: {}", e);
            exit(1);
        }
    };

    let default_filter = if settings.silent { "spaserve=warn" } else { "spaserve=info" };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));
    logger::init_logger(settings.silent, !matches.get_flag("no-timestamps"));
    let app_logger = logger::get_logger();
    app_logger.startup_info(PKG_NAME, PKG_VERSION);

    let serve_config = match settings.serve_config() {
        Ok(config) => config,
        Err(e) => {
            app_logger.error(&e.to_string());
            exit(1);
        }
    };

    if let Err(e) = verify_root_document(&serve_config.base_directory) {
        app_logger.error(&e.to_string());
        exit(1);
    }

    let cache = match CompressionCache::build(&serve_config.base_directory).await {
        Ok(cache) => cache,
        Err(e) => {
            app_logger.error(&format!("Failed to precompress assets: {}", e));
            exit(1);
        }
    };
    log::info!(
        "Precompressed {} assets from {}",
        cache.routes().count(),
        serve_config.base_directory.display()
    );

    if !settings.ssl && (settings.key.is_some() || settings.cert.is_some()) {
        app_logger.warn("--key and --cert are ignored without --ssl");
    }

    let tls_source = match tls::validate_ssl_args(
        settings.ssl,
        settings.cert.as_deref(),
        settings.key.as_deref(),
    ) {
        Ok(source) => source,
        Err(e) => {
            app_logger.error(&format!("SSL configuration error: {}", e));
            exit(1);
        }
    };

    let rustls_config = match tls_source {
        Some(ref source) => match source.load_server_config() {
            Ok(config) => {
                app_logger.info(&format!("HTTPS enabled with {}", source.describe()));
                Some(config)
            }
            Err(e) => {
                app_logger.error(&format!("Failed to load TLS configuration: {}", e));
                exit(1);
            }
        },
        None => None,
    };

    if let Err(e) = NetworkUtils::ensure_port_available(BIND_HOST, settings.port) {
        app_logger.error(&e);
        exit(1);
    }

    if serve_config.cors_enabled {
        app_logger.info("CORS: enabled");
    }
    if serve_config.cache_headers_enabled {
        app_logger.info("Cache headers: enabled");
    }
    if !serve_config.base_href.is_empty() {
        app_logger.info(&format!("Base href: {}", serve_config.base_href));
    }

    let dispatcher_data = web::Data::new(Dispatcher::new(serve_config, cache));
    app_logger.info(&format!(
        "Serving {}",
        dispatcher_data.config().base_directory.display()
    ));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            .wrap(DefaultHeaders::new().add((header::SERVER, PKG_NAME)))
            .app_data(dispatcher_data.clone())
            .default_service(web::to(dispatcher::handle))
    })
    .workers(1)
    .disable_signals();

    let bound = match rustls_config {
        Some(config) => server.bind_rustls_0_23((BIND_HOST, settings.port), config),
        None => server.bind((BIND_HOST, settings.port)),
    };
    let server = match bound {
        Ok(server) => server.run(),
        Err(e) => {
            app_logger.error(&format!("Failed to bind port {}: {}", settings.port, e));
            exit(1);
        }
    };

    if let Err(e) = shutdown::install_signal_handlers(server.handle()) {
        app_logger.warn(&format!("Failed to set up signal handling: {}", e));
    }

    let addresses =
        NetworkUtils::create_server_addresses(BIND_HOST, settings.port, tls_source.is_some());
    app_logger.server_info(&addresses.local, addresses.network.as_deref());
    app_logger.info(&format!("Listening on {}", settings.port));

    if settings.open {
        let url = addresses.local.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = browser::open_url(&url) {
                log_warn!("Could not open browser: {}", e);
            }
        });
    }

    server.await
}
