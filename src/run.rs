use std::sync::Arc;

use anyhow::Context as _;
use serenity::http::Http;
use serenity::model::id::UserId;
use serenity::prelude::GatewayIntents;

use crate::db::config::ConfigStore;
use crate::db::ensure_data_folder;
use crate::dispatch::Dispatch;
use crate::module::anti_spam::detector::SpamDetector;
use crate::module::anti_spam::mitigation::{MitigationConfig, Mitigator};
use crate::module::anti_spam::worker::{DeleteQueue, WorkerConfig};
use crate::module::anti_spam::{sweep_forever, AntiSpam, AntiSpamModule};
use crate::module::base_filter::BaseFilter;
use crate::module::privilege::PrivilegeFilter;
use crate::platform::discord::DiscordPlatform;
use crate::platform::Platform;

/// Directory under the data folder which receives spam records.
pub const SPAM_RECORD_DIR: &str = "spam";

fn owner_from_env() -> Option<UserId> {
    let raw = std::env::var("WARDEN_OWNER").ok()?;
    match raw.trim().parse::<u64>() {
        Ok(id) if id != 0 => Some(UserId::new(id)),
        _ => {
            warn!("WARDEN_OWNER isn't a user id: {}", raw);
            None
        }
    }
}

// Starts Warden.
pub async fn start_bot() -> anyhow::Result<()> {
    let token = std::env::var("WARDEN_TOKEN").context("Didn't find a token in WARDEN_TOKEN.")?;
    let data_dir = ensure_data_folder().context("Couldn't create the data directory.")?;
    let config = Arc::new(ConfigStore::in_dir(&data_dir)?);
    info!("using config at {}", config.path().display());

    let platform: Arc<dyn Platform> = Arc::new(DiscordPlatform::new(Arc::new(Http::new(&token))));
    let (queue, worker) = DeleteQueue::new(platform.clone(), WorkerConfig::default());
    tokio::spawn(worker.run());

    let mitigator = Mitigator::new(platform.clone(), queue, data_dir.join(SPAM_RECORD_DIR), MitigationConfig::default());
    let engine = Arc::new(AntiSpam::new(SpamDetector::default(), mitigator, platform, config));
    tokio::spawn(sweep_forever(engine.clone()));

    let mut dispatch = Dispatch::new(owner_from_env());
    dispatch.add_module(BaseFilter);
    dispatch.add_module(PrivilegeFilter);
    dispatch.add_module(AntiSpamModule::new(engine));

    let intents = GatewayIntents::privileged() | GatewayIntents::GUILD_MESSAGES | GatewayIntents::GUILDS;
    let mut client = serenity::Client::builder(&token, intents)
        .event_handler(dispatch)
        .await?;

    let shard_man = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutting down.");
                shard_man.shutdown_all().await;
            }
            Err(e) => error!("failed to listen for Ctrl + C: {}", e),
        }
    });

    client.start_autosharded().await?;
    Ok(())
}
