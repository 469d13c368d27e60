//! Channel management and guild information.

use std::time::Duration;

use serenity::all::{
    ChannelId, ChannelType, CreateChannel, EditChannel, GuildChannel, GuildId, PermissionOverwrite,
    Timestamp, UserId,
};

use crate::client::EzDiscord;
use crate::error::Result;

/// A summary of a guild, one HTTP fetch worth of facts.
#[derive(Debug, Clone)]
pub struct GuildInfo {
    pub id: GuildId,
    pub name: String,
    pub owner_id: UserId,
    pub member_count: Option<u64>,
    pub role_count: usize,
    pub channel_count: usize,
    pub vanity_url_code: Option<String>,
    pub created_at: Timestamp,
}

impl EzDiscord {
    /// Creates a channel of the given kind in a guild.
    pub async fn create_channel(
        &self,
        guild: GuildId,
        name: impl Into<String>,
        kind: ChannelType,
    ) -> Result<GuildChannel> {
        let channel = guild
            .create_channel(&self.inner.http, CreateChannel::new(name).kind(kind))
            .await?;
        Ok(channel)
    }

    /// Deletes a channel, after an optional delay.
    pub async fn delete_channel(&self, channel: ChannelId, after: Option<Duration>) -> Result<()> {
        if let Some(delay) = after {
            tokio::time::sleep(delay).await;
        }
        channel.delete(&self.inner.http).await?;
        Ok(())
    }

    /// Replaces a channel's permission overwrites, after an optional delay.
    pub async fn edit_channel_permissions(
        &self,
        channel: ChannelId,
        overwrites: Vec<PermissionOverwrite>,
        after: Option<Duration>,
    ) -> Result<()> {
        if let Some(delay) = after {
            tokio::time::sleep(delay).await;
        }
        channel
            .edit(&self.inner.http, EditChannel::new().permissions(overwrites))
            .await?;
        Ok(())
    }

    /// Fetches a [`GuildInfo`] summary. Costs two HTTP requests, one for
    /// the guild and one for its channel list.
    pub async fn guild_info(&self, guild: GuildId) -> Result<GuildInfo> {
        let partial = guild
            .to_partial_guild_with_counts(&self.inner.http)
            .await?;
        let channels = guild.channels(&self.inner.http).await?;
        Ok(GuildInfo {
            id: guild,
            name: partial.name,
            owner_id: partial.owner_id,
            member_count: partial.approximate_member_count,
            role_count: partial.roles.len(),
            channel_count: channels.len(),
            vanity_url_code: partial.vanity_url_code,
            created_at: guild.created_at(),
        })
    }
}
