//! Webmail Server
//!
//! An in-app mailbox backend: accounts with TOTP two-factor authentication,
//! mailbox CRUD, and live delivery notifications over WebSocket.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webmail_core::TokenSigner;

use webmail_server::store::{AccountStore, MailStore};
use webmail_server::{
    load_or_generate_signing_key, routes, AppState, Config, HttpClassifier, InMemoryAccountStore,
    InMemoryMailStore, NullClassifier, SpamClassifier, SqliteStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webmail_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");

    // Load or generate the token-signing key
    let signer = load_or_generate_signing_key(&config.key_file)?;
    tracing::info!(
        public_key = %signer.verifier().to_base64(),
        "Loaded signing key"
    );

    let classifier: Box<dyn SpamClassifier> = match &config.classifier_url {
        Some(url) => Box::new(HttpClassifier::new(url.clone())),
        None => Box::new(NullClassifier),
    };

    match config.database.clone() {
        Some(path) => {
            let accounts = SqliteStore::open(&path)?;
            let mails = SqliteStore::open(&path)?;
            serve(config, signer, accounts, mails, classifier).await
        }
        None => {
            serve(
                config,
                signer,
                InMemoryAccountStore::new(),
                InMemoryMailStore::new(),
                classifier,
            )
            .await
        }
    }
}

async fn serve<U, M>(
    config: Config,
    signer: TokenSigner,
    accounts: U,
    mails: M,
    classifier: Box<dyn SpamClassifier>,
) -> Result<()>
where
    U: AccountStore + 'static,
    M: MailStore + 'static,
{
    // Create app state
    let state = Arc::new(AppState::new(
        signer,
        config.issuer.clone(),
        accounts,
        mails,
        classifier,
    ));

    // Create router
    let app = routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Webmail server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
