//! Voice channel presence, behind the `voice` feature.
//!
//! Only the gateway side of voice is wrapped: joining and leaving channels.
//! Audio playback needs the songbird driver, which is out of scope here;
//! the [`songbird`](EzDiscord::songbird) accessor exposes the manager for
//! anything beyond presence.

use serenity::all::{ChannelId, GuildId};
use std::sync::Arc;

use crate::client::EzDiscord;
use crate::error::Result;

impl EzDiscord {
    /// The voice manager wired into the client at login.
    pub fn songbird(&self) -> Arc<songbird::Songbird> {
        self.inner.songbird.clone()
    }

    /// Joins a voice channel. The bot shows up in the channel's member
    /// list; rejoining another channel in the same guild moves it.
    pub async fn connect_to_voice(&self, guild: GuildId, channel: ChannelId) -> Result<()> {
        self.inner
            .songbird
            .join_gateway(guild, channel)
            .await
            .map(drop)?;
        Ok(())
    }

    /// Leaves the voice channel in a guild, if the bot is in one.
    pub async fn disconnect_voice(&self, guild: GuildId) -> Result<()> {
        self.inner.songbird.remove(guild).await?;
        Ok(())
    }
}
