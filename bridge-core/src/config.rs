// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required fields before startup and redacts secrets in Debug output

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_proxy_url() -> String {
    "ws://127.0.0.1:12393/proxy-ws".to_string()
}

fn default_character_name() -> String {
    "Mao".to_string()
}

fn default_discord_bot_nick() -> String {
    "DiscordBot".to_string()
}

fn default_twitch_bot_nick() -> String {
    "TwitchBot".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<DiscordConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitch: Option<TwitchConfig>,
    #[serde(default)]
    pub live: LiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// WebSocket endpoint of the local inference proxy
    #[serde(default = "default_proxy_url")]
    pub url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            url: default_proxy_url(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Discord bot token
    pub token: String,
    #[serde(default = "default_discord_bot_nick")]
    pub bot_nick: String,
    /// Character display name used in replies/logs
    #[serde(default = "default_character_name")]
    pub character_name: String,
    /// Sender allowlist; empty means every non-echo sender is forwarded
    #[serde(default)]
    pub friend_ids: Vec<u64>,
}

// Custom Debug impl to redact the bot token
impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"[REDACTED]")
            .field("bot_nick", &self.bot_nick)
            .field("character_name", &self.character_name)
            .field("friend_ids", &self.friend_ids)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TwitchConfig {
    /// Twitch channel to join
    pub channel: String,
    /// Twitch OAuth token
    pub token: String,
    #[serde(default = "default_twitch_bot_nick")]
    pub bot_nick: String,
    /// Character name gating inbound messages (case-insensitive substring)
    #[serde(default = "default_character_name")]
    pub character_name: String,
}

impl std::fmt::Debug for TwitchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchConfig")
            .field("channel", &self.channel)
            .field("token", &"[REDACTED]")
            .field("bot_nick", &self.bot_nick)
            .field("character_name", &self.character_name)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LiveConfig {
    /// Optional marker file whose existence signals an active stream.
    /// Watched by the binary, never by the bridge itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_path: Option<PathBuf>,
}

impl Config {
    /// Locate the config file, in priority order:
    /// 1. BRIDGE_CONFIG_PATH env var (if set)
    /// 2. ./config.toml
    /// 3. ~/.config/vtuber-bridge/config.toml
    pub fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("BRIDGE_CONFIG_PATH") {
            let path = PathBuf::from(env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("config.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "vtuber-bridge") {
            let path = dirs.config_dir().join("config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Load configuration from file (if found), apply environment overrides,
    /// then validate. Fails fast before any connection attempt.
    pub fn load() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(path = %config_path.display(), "Loading config file");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using defaults and environment");
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()
    }

    /// Apply environment variable overrides on top of file values.
    /// Setting a platform's token creates the platform section if absent.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PROXY_URL") {
            self.proxy.url = val;
        }

        if let Ok(val) = std::env::var("DISCORD_TOKEN") {
            let discord = self.discord.get_or_insert_with(|| DiscordConfig {
                token: String::new(),
                bot_nick: default_discord_bot_nick(),
                character_name: default_character_name(),
                friend_ids: Vec::new(),
            });
            discord.token = val;
        }
        if let Some(discord) = self.discord.as_mut() {
            if let Ok(val) = std::env::var("DISCORD_BOT_NICK") {
                discord.bot_nick = val;
            }
            if let Ok(val) = std::env::var("DISCORD_CHARACTER_NAME") {
                discord.character_name = val;
            }
            if let Ok(val) = std::env::var("DISCORD_FRIEND_IDS") {
                discord.friend_ids = val
                    .split(',')
                    .filter_map(|id| id.trim().parse().ok())
                    .collect();
            }
        }

        if let Ok(val) = std::env::var("TWITCH_TOKEN") {
            let twitch = self.twitch.get_or_insert_with(|| TwitchConfig {
                channel: String::new(),
                token: String::new(),
                bot_nick: default_twitch_bot_nick(),
                character_name: default_character_name(),
            });
            twitch.token = val;
        }
        if let Some(twitch) = self.twitch.as_mut() {
            if let Ok(val) = std::env::var("TWITCH_CHANNEL") {
                twitch.channel = val;
            }
            if let Ok(val) = std::env::var("TWITCH_BOT_NICK") {
                twitch.bot_nick = val;
            }
            if let Ok(val) = std::env::var("TWITCH_CHARACTER_NAME") {
                twitch.character_name = val;
            }
        }

        if let Ok(val) = std::env::var("LIVE_MARKER_PATH") {
            self.live.marker_path = Some(PathBuf::from(val));
        }
    }

    /// Validate required fields for every configured platform.
    pub fn validate(self) -> Result<Self> {
        if self.proxy.url.is_empty() {
            anyhow::bail!("proxy.url must not be empty");
        }
        if let Some(discord) = &self.discord {
            if discord.token.is_empty() {
                anyhow::bail!("discord.token is required when the discord section is present");
            }
        }
        if let Some(twitch) = &self.twitch {
            if twitch.token.is_empty() {
                anyhow::bail!("twitch.token is required when the twitch section is present");
            }
            if twitch.channel.is_empty() {
                anyhow::bail!("twitch.channel is required when the twitch section is present");
            }
        }
        Ok(self)
    }

    /// Get the Discord config, erroring if not configured.
    pub fn discord_config(&self) -> Result<&DiscordConfig> {
        self.discord
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Discord is not configured (missing discord section or DISCORD_TOKEN)"))
    }

    /// Get the Twitch config, erroring if not configured.
    pub fn twitch_config(&self) -> Result<&TwitchConfig> {
        self.twitch
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Twitch is not configured (missing twitch section or TWITCH_TOKEN)"))
    }
}

// =============================================================================
// Tests
// =============================================================================
