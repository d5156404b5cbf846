use std::sync::Arc;

use servitor_core::{
    commands::CommandRouter,
    config::Config,
    engine::CorrelationEngine,
    messaging::port::MessagingPort,
    store::{LocalStore, SessionStore},
};
use servitor_google::{GoogleCalendarWatcher, GoogleOAuthClient, GoogleOAuthConfig};
use servitor_telegram::TelegramMessenger;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), servitor_core::Error> {
    let cfg = Arc::new(Config::load()?);
    servitor_core::logging::init("servitor", cfg.log_json)?;

    let store = match &cfg.store_path {
        Some(path) => LocalStore::open(path)?,
        None => LocalStore::in_memory(),
    }
    .with_max_attempts(cfg.tx_max_attempts);
    info!(
        sessions = store.len(),
        persistent = cfg.store_path.is_some(),
        "session store ready"
    );
    let store: Arc<dyn SessionStore> = Arc::new(store);

    let oauth_cfg = GoogleOAuthConfig::load(&cfg.client_secret_path, &cfg.public_host)?;
    info!(redirect_uri = %oauth_cfg.redirect_uri, "google oauth configured");
    let oauth = Arc::new(GoogleOAuthClient::new(oauth_cfg, cfg.exchange_timeout)?);
    let watcher = Arc::new(GoogleCalendarWatcher::new(
        cfg.notification_url(),
        cfg.exchange_timeout,
    )?);

    let engine = Arc::new(
        CorrelationEngine::new(store, oauth).with_exchange_timeout(cfg.exchange_timeout),
    );
    let commands = Arc::new(CommandRouter::new(engine.clone()).with_watcher(watcher));

    let bot = teloxide::Bot::new(cfg.telegram_bot_token.clone());
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let http_state = Arc::new(servitor_http::AppState {
        engine,
        messenger: messenger.clone(),
    });
    let tg_state = Arc::new(servitor_telegram::router::AppState {
        commands,
        messenger,
    });

    tokio::select! {
        res = servitor_http::serve(cfg.http_bind, http_state) => res?,
        res = servitor_telegram::router::run_polling(bot, tg_state) => {
            res.map_err(|e| servitor_core::Error::External(format!("telegram bot failed: {e}")))?
        }
    }

    info!("shutting down");
    Ok(())
}
