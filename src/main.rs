//! Fieldgate CLI - sign in to a field-data server from the command line.
//!
//! This binary is the composition root: every service is constructed once
//! here and handed by reference to what needs it.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use fieldgate::auth::cache::StrategyCache;
use fieldgate::auth::coordinator::AuthCoordinator;
use fieldgate::auth::credentials::CredentialsAuthModule;
use fieldgate::auth::discovery::CapabilityDiscovery;
use fieldgate::auth::identity::IdentityStore;
use fieldgate::auth::logout::LogoutService;
use fieldgate::auth::offline::OfflineAuthModule;
use fieldgate::auth::registry::ModuleRegistry;
use fieldgate::auth::session::SessionStore;
use fieldgate::auth::strategy::{classify, StrategyDescriptor, StrategyKind};
use fieldgate::auth::{AuthModule, AuthenticationStatus, LoginOutcome, ModuleLogin};
use fieldgate::config::ClientConfig;

const USAGE: &str = "Usage:
  fieldgate login <server-url> <username> [--strategy ID] [--offline]
  fieldgate strategies <server-url>
  fieldgate logout <server-url>

The password is read from FIELDGATE_PASSWORD or prompted on stdin.";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = ClientConfig::load();

    match args.first().map(String::as_str) {
        Some("login") => login_command(&args[1..], &config).await,
        Some("strategies") => strategies_command(&args[1..], &config).await,
        Some("logout") => logout_command(&args[1..]).await,
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

async fn login_command(args: &[String], config: &ClientConfig) -> Result<()> {
    let server_url = args.first().ok_or_else(|| anyhow!(USAGE))?.clone();
    let username = args.get(1).ok_or_else(|| anyhow!(USAGE))?.clone();
    let offline = args.iter().any(|a| a == "--offline");
    let strategy_id = args
        .iter()
        .position(|a| a == "--strategy")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "local".to_string());

    let password = read_password()?;

    let identity = Arc::new(IdentityStore::open()?);
    let session_store = Arc::new(SessionStore::new());
    let registry = Arc::new(ModuleRegistry::new());
    let coordinator = AuthCoordinator::new(Arc::clone(&registry), Arc::clone(&session_store))
        .with_module_timeout(config.module_timeout());

    let mut params = serde_json::Map::new();
    params.insert("username".to_string(), Value::String(username));
    params.insert("password".to_string(), Value::String(password));

    let result = if offline {
        registry.install(vec![Arc::new(OfflineAuthModule::new(identity))]);
        coordinator.login_offline(&params).await
    } else {
        let strategy = install_modules(&server_url, &strategy_id, config, &identity, &registry)
            .await?;
        coordinator.login(&strategy, &params).await
    };

    let outcome = match result {
        ModuleLogin::Complete(outcome) => outcome,
        ModuleLogin::NeedsCompletion { message } => {
            if let Some(message) = message {
                println!("{}", message);
            }
            let finished = coordinator.finish_login(&strategy_id).await;
            LoginOutcome {
                status: finished.status,
                message: finished.message,
                session: finished.session,
            }
        }
    };

    report(&outcome, &session_store);
    Ok(())
}

/// Discover the server's strategies, refresh the local cache, and install
/// one module per supported strategy plus the offline fallback.
async fn install_modules(
    server_url: &str,
    strategy_id: &str,
    config: &ClientConfig,
    identity: &Arc<IdentityStore>,
    registry: &Arc<ModuleRegistry>,
) -> Result<StrategyDescriptor> {
    let discovery = CapabilityDiscovery::new(config.discovery_timeout());
    let capabilities = discovery
        .discover(server_url)
        .await
        .with_context(|| format!("could not reach {}", server_url))?;

    if let Ok(cache) = StrategyCache::open() {
        if let Err(err) = cache.store(&capabilities) {
            tracing::warn!(%err, "could not refresh strategy cache");
        }
    }

    let mut modules: Vec<Arc<dyn AuthModule>> = capabilities
        .keys()
        .filter_map(|id| match classify(id) {
            StrategyKind::Local | StrategyKind::Ldap => Some(Arc::new(
                CredentialsAuthModule::new(id.clone(), server_url, Arc::clone(identity)),
            )
                as Arc<dyn AuthModule>),
            _ => None,
        })
        .collect();
    modules.push(Arc::new(OfflineAuthModule::new(Arc::clone(identity))));
    registry.install(modules);

    let raw = capabilities
        .get(strategy_id)
        .ok_or_else(|| anyhow!("server does not advertise strategy '{}'", strategy_id))?;
    Ok(StrategyDescriptor::new(
        strategy_id,
        extract_parameters(raw),
    ))
}

fn extract_parameters(raw: &Value) -> serde_json::Map<String, Value> {
    raw.get("strategy")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

async fn strategies_command(args: &[String], config: &ClientConfig) -> Result<()> {
    let server_url = args.first().ok_or_else(|| anyhow!(USAGE))?;
    let discovery = CapabilityDiscovery::new(config.discovery_timeout());

    let descriptors = match discovery.discover(server_url).await {
        Ok(capabilities) => {
            if let Ok(cache) = StrategyCache::open() {
                let _ = cache.store(&capabilities);
            }
            capabilities
                .iter()
                .map(|(id, raw)| StrategyDescriptor::new(id.clone(), extract_parameters(raw)))
                .collect()
        }
        Err(err) => {
            // Fall back to the last discovery so the list renders offline
            eprintln!("server unreachable ({}), showing cached strategies", err);
            StrategyCache::open()?.load()
        }
    };

    if descriptors.is_empty() {
        bail!("no strategies known for {}", server_url);
    }
    for descriptor in descriptors {
        println!("{}\t{:?}", descriptor.id, descriptor.kind);
    }
    Ok(())
}

async fn logout_command(args: &[String]) -> Result<()> {
    let server_url = args.first().ok_or_else(|| anyhow!(USAGE))?;

    // Remote invalidation is best-effort; local state is cleared regardless
    LogoutService::new(server_url.clone()).logout().await;

    let identity = IdentityStore::open()?;
    identity.store_token(None)?;
    println!("logged out");
    Ok(())
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var("FIELDGATE_PASSWORD") {
        return Ok(password);
    }
    print!("password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("could not read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn report(outcome: &LoginOutcome, session_store: &SessionStore) {
    match &outcome.status {
        AuthenticationStatus::Success => {
            println!("authenticated");
            if let Some(session) = session_store.current() {
                if let Some(username) = session.username {
                    println!("user: {}", username);
                }
            }
        }
        AuthenticationStatus::RegistrationSuccess => {
            println!(
                "registered: {}",
                outcome.message.as_deref().unwrap_or("awaiting approval")
            );
        }
        AuthenticationStatus::Unable => {
            eprintln!(
                "login failed: {}",
                outcome.message.as_deref().unwrap_or("unknown error")
            );
            std::process::exit(1);
        }
        AuthenticationStatus::Module(status) => {
            println!(
                "{}: {}",
                status,
                outcome.message.as_deref().unwrap_or_default()
            );
        }
    }
}
