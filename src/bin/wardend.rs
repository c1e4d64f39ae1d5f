//! Demo host process for `warden`.
//!
//! Wires a [`warden::PermissionsController`] to two toy restricted
//! methods and a terminal-prompt approval function, then drives it
//! through a short scripted session. The transport, UI, and restricted
//! method bodies are entirely a host concern — this exists so the
//! library has a runnable, driveable home.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use warden::{
    Config, OriginMetadata, PermissionRequest, PermissionsController, Request,
    RequestUserApproval, RestrictedMethodDescriptor, Response,
};

/// warden demo host
#[derive(Parser, Debug)]
#[command(name = "wardend", version, about)]
struct Args {
    /// Host configuration file
    #[arg(short, long, default_value = "wardend.yaml")]
    config: PathBuf,

    /// Prefix for the internal getPermissions/requestPermissions methods
    #[arg(long, default_value = "wallet_")]
    prefix: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Host-owned configuration — not the `PermissionsController::Config`,
/// which can't be deserialized since it carries a closure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HostConfig {
    #[serde(default)]
    safe_methods: Vec<String>,
}

async fn load_host_config(path: &std::path::Path) -> Result<HostConfig> {
    if path.exists() {
        let contents = tokio::fs::read_to_string(path).await?;
        let config: HostConfig = serde_yaml::from_str(&contents)?;
        info!("loaded host config from {}", path.display());
        Ok(config)
    } else {
        info!("no host config found at {}, using defaults", path.display());
        Ok(HostConfig::default())
    }
}

fn read_contacts_method() -> warden::Handler {
    Arc::new(|_req: Request| Box::pin(async move { Response::ok(json!(["alice", "bob", "carol"])) }))
}

fn read_accounts_method() -> warden::Handler {
    Arc::new(|_req: Request| Box::pin(async move { Response::ok(json!(["0xA", "0xB", "0xC"])) }))
}

/// Approval function: prints the pending request and auto-approves
/// exactly what was requested. A real host would block on a terminal
/// or UI prompt here (see `tokio::task::spawn_blocking` around
/// `std::io::stdin` for that shape); this demo approves unconditionally
/// so the scripted session below is deterministic.
fn terminal_approval() -> RequestUserApproval {
    Arc::new(|req: PermissionRequest| {
        Box::pin(async move {
            info!(origin = %req.origin, methods = ?req.permissions.keys().collect::<Vec<_>>(), "approving permission request");
            Ok(req.permissions)
        })
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let host_config = load_host_config(&args.config).await?;

    let mut restricted_methods = HashMap::new();
    restricted_methods.insert(
        "readContacts".to_string(),
        RestrictedMethodDescriptor {
            description: "Read the domain's contact list".into(),
            method: read_contacts_method(),
        },
    );
    restricted_methods.insert(
        "readAccounts".to_string(),
        RestrictedMethodDescriptor {
            description: "Read the domain's account addresses".into(),
            method: read_accounts_method(),
        },
    );

    let controller = PermissionsController::new(Config {
        safe_methods: host_config.safe_methods,
        restricted_methods,
        method_prefix: args.prefix.clone(),
        request_user_approval: Some(terminal_approval()),
    })?;

    info!("warden ready, running demo session");
    run_demo_session(&controller, &args.prefix).await;

    Ok(())
}

async fn run_demo_session(controller: &PermissionsController, prefix: &str) {
    let origin = OriginMetadata::new("https://example.dapp");

    let denied = controller
        .handle_request(origin.clone(), Request::new("readContacts", vec![]))
        .await;
    log_outcome("readContacts (before grant)", denied);

    let grant_req = Request::new(
        format!("{prefix}requestPermissions"),
        vec![json!({"readContacts": {}, "readAccounts": {"caveats": [{"type": "filterResponse", "value": ["0xA", "0xB"]}]}})],
    );
    let granted = controller.handle_request(origin.clone(), grant_req).await;
    log_outcome("requestPermissions", granted);

    let allowed = controller
        .handle_request(origin.clone(), Request::new("readContacts", vec![]))
        .await;
    log_outcome("readContacts (after grant)", allowed);

    let filtered = controller
        .handle_request(origin.clone(), Request::new("readAccounts", vec![]))
        .await;
    log_outcome("readAccounts (caveat-filtered)", filtered);

    let listed = controller
        .handle_request(origin, Request::new(format!("{prefix}getPermissions"), vec![]))
        .await;
    log_outcome("getPermissions", listed);
}

fn log_outcome(label: &str, outcome: warden::Outcome) {
    match outcome {
        warden::Outcome::PassThrough => info!(%label, "pass-through"),
        warden::Outcome::Handled(res) => match res {
            Response { result: Some(r), .. } => info!(%label, result = %r, "ok"),
            Response { error: Some(e), .. } => info!(%label, error = %e.message, code = e.code, "error"),
            _ => info!(%label, "empty response"),
        },
    }
}
