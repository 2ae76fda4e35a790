//! Example: Make an authenticated request with filters built from config.
//!
//! This example demonstrates the full setup of an authenticated client:
//! 1. Load the config (profile + auth type)
//! 2. Build a `WebClient` from it (basic, digest or bearer with refresh)
//! 3. Add a `User-Agent` with a plain tower-http layer
//! 4. Make a request
//!
//! # Prerequisites
//!
//! A config file at the default path
//! (e.g., `~/.config/webclient-auth/config.toml` on Linux):
//!
//! ```toml
//! version = 1
//! base_url = "http://localhost:8080/"
//!
//! [default]
//! auth_type = "basic"
//! username = "rob"
//! password = "rob"
//! ```
//!
//! Any key can be overridden with a `WEBCLIENT_AUTH_` environment variable,
//! e.g. `WEBCLIENT_AUTH_BASE_URL`.
//!
//! # Usage
//!
//! ```sh
//! cargo run --example use_client -- /messages/1
//! ```

use http::{HeaderValue, header::USER_AGENT};
use tower_http::set_header::SetRequestHeaderLayer;

use webclient_auth::client::{AuthorizationLayer, WebClient, basic_if_needed, digest_if_needed};
use webclient_auth::config::{self, AuthType};

#[tokio::main]
async fn main() {
    // Initialize tracing. Control verbosity via the RUST_LOG env var:
    //   RUST_LOG=debug cargo run --example use_client
    //   RUST_LOG=webclient_auth=debug cargo run --example use_client
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webclient_auth=info".parse().unwrap()),
        )
        .init();

    let profile = "default";
    let path = std::env::args().nth(1).unwrap_or_else(|| "/".to_string());
    println!("Using profile: {profile}");

    // Step 1: Load the config for the profile.
    let cfg = config::load_config(Some(profile)).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}");
        std::process::exit(1);
    });
    println!("Auth type:  {:?}", cfg.auth_type);
    println!("Base URL:   {:?}", cfg.base_url);

    // Step 2: The simple route, everything wired from config.
    let client = WebClient::from_config(&cfg).unwrap_or_else(|e| {
        eprintln!("Failed to create client: {e}");
        std::process::exit(1);
    });
    println!("Client:     {client:?}");

    // Step 3: The same filters by hand, plus a User-Agent. Filters run in
    // the order they're added.
    let mut builder = WebClient::builder()
        .base_url(cfg.base_url.clone().unwrap_or_default())
        .filter(SetRequestHeaderLayer::overriding(
            USER_AGENT,
            HeaderValue::from_static("webclient-auth-demo/0.1.0"),
        ));
    if let Some(timeout) = cfg.timeout() {
        builder = builder.timeout(timeout);
    }
    let username = cfg.username.clone().unwrap_or_default();
    let password = cfg.password.clone().unwrap_or_default();
    builder = match cfg.auth_type {
        Some(AuthType::Basic) => builder.filter(basic_if_needed(username, password)),
        Some(AuthType::Digest) => builder.filter(digest_if_needed(username, password)),
        Some(AuthType::Bearer) => {
            let token = cfg.access_token.clone().unwrap_or_default();
            match AuthorizationLayer::bearer(&token) {
                Ok(layer) => builder.filter(layer),
                Err(e) => {
                    eprintln!("Invalid access token: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => builder,
    };
    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to create client: {e}");
            std::process::exit(1);
        }
    };

    // Step 4: Make the request.
    println!("\nRequesting: {path}");
    match client.get(&path).header("accept", "application/json").exchange().await {
        Ok(response) => {
            println!("Status: {}", response.status());
            match response.text().await {
                Ok(body) => println!("Body: {body}"),
                Err(e) => eprintln!("Failed to read body: {e}"),
            }
        }
        Err(e) => eprintln!("Request failed: {e}"),
    }
}
