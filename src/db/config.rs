//! Flat JSON configuration document. Every write rewrites the whole file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serenity::model::id::{ChannelId, GuildId};

use crate::error::UserError;
use crate::module::anti_spam::settings::SpamSettings;

/// File name of the config document inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Bot-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub spam: SpamSettings,
}

/// Per-guild settings. Unset values fall back to [`GlobalConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildConfig {
    /// Channel which receives deletion summaries.
    pub mod_log_channel: Option<ChannelId>,
    /// Full override of the global spam settings.
    pub spam: Option<SpamSettings>,
}

/// The on-disk document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    pub global: GlobalConfig,
    /// Keyed by the guild id in decimal.
    pub guilds: BTreeMap<String, GuildConfig>,
}

impl ConfigDocument {
    pub fn guild(&self, guild: GuildId) -> Option<&GuildConfig> {
        self.guilds.get(&guild.to_string())
    }

    /// Checks the global settings and every guild override against the chat-settable bounds.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.global.spam.validate()
            .map_err(|e| UserError::new(format!("global spam settings: {}", e)))?;
        for (id, g) in &self.guilds {
            if let Some(spam) = &g.spam {
                spam.validate()
                    .map_err(|e| UserError::new(format!("spam settings for guild {}: {}", id, e)))?;
            }
        }
        Ok(())
    }
}

/// Shared handle to the config document.
pub struct ConfigStore {
    path: PathBuf,
    doc: RwLock<ConfigDocument>,
    /// Serializes writers so the file always reflects the latest document.
    save_lock: tokio::sync::Mutex<()>,
}

impl ConfigStore {
    /// Loads the document at `path`, or starts from defaults if it doesn't exist yet.
    pub fn open(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let doc: ConfigDocument = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no config at {}, using defaults", path.display());
                ConfigDocument::default()
            }
            Err(e) => return Err(e.into()),
        };
        doc.validate()
            .map_err(|e| UserError::new(format!("invalid config at {}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            doc: RwLock::new(doc),
            save_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Opens `config.json` in the given data directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> crate::error::Result<Self> {
        Self::open(dir.as_ref().join(CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The spam settings in effect for a guild.
    pub fn spam_settings(&self, guild: GuildId) -> SpamSettings {
        let doc = self.doc.read();
        doc.guild(guild)
            .and_then(|g| g.spam.clone())
            .unwrap_or_else(|| doc.global.spam.clone())
    }

    pub fn mod_log_channel(&self, guild: GuildId) -> Option<ChannelId> {
        self.doc.read().guild(guild).and_then(|g| g.mod_log_channel)
    }

    /// Edits the guild's spam override, seeding it from the global settings first.
    pub async fn update_spam_settings<F>(&self, guild: GuildId, f: F) -> crate::error::Result<SpamSettings>
        where F: FnOnce(&mut SpamSettings) -> crate::error::Result<()> + Send {
        let mut out = None;
        self.update(|doc| {
            let global = doc.global.spam.clone();
            let g = doc.guilds.entry(guild.to_string()).or_default();
            let mut settings = g.spam.clone().unwrap_or(global);
            f(&mut settings)?;
            g.spam = Some(settings.clone());
            out = Some(settings);
            Ok(())
        }).await?;
        Ok(out.unwrap_or_default())
    }

    pub async fn set_mod_log_channel(&self, guild: GuildId, channel: Option<ChannelId>) -> crate::error::Result<()> {
        self.update(|doc| {
            doc.guilds.entry(guild.to_string()).or_default().mod_log_channel = channel;
            Ok(())
        }).await
    }

    /// Applies `f` to the document and rewrites the file. If `f` fails nothing changes.
    pub async fn update<F>(&self, f: F) -> crate::error::Result<()>
        where F: FnOnce(&mut ConfigDocument) -> crate::error::Result<()> + Send {
        let _guard = self.save_lock.lock().await;
        let serialized = {
            let mut doc = self.doc.write();
            let mut next = doc.clone();
            f(&mut next)?;
            let s = serde_json::to_vec_pretty(&next)?;
            *doc = next;
            s
        };

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("saved config to {}", self.path.display());
        Ok(())
    }
}
