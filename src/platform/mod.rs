// ABOUTME: Platform adapter module for the bridge
// ABOUTME: Re-exports platform implementations (Discord, Twitch)

#[cfg(feature = "discord")]
pub mod discord;
#[cfg(feature = "twitch")]
pub mod twitch;

#[cfg(feature = "discord")]
pub use discord::DiscordAdapter;
#[cfg(feature = "twitch")]
pub use twitch::TwitchAdapter;
