use serenity::all::GuildId;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Anything the underlying Discord client reports: HTTP failures,
    /// gateway errors, model validation.
    #[error("discord error: {0}")]
    Discord(#[from] serenity::Error),

    /// Listing the invites of a guild failed, usually because the bot
    /// lacks the Manage Guild permission there.
    #[error("invite fetch failed for guild {guild_id}: {reason}")]
    InviteFetch { guild_id: GuildId, reason: String },

    /// A join was attributed in a guild the invite tracker has never
    /// seen and could not load on demand.
    #[error("guild {guild_id} is not tracked and could not be loaded: {reason}")]
    UnknownGuild { guild_id: GuildId, reason: String },

    /// `DISCORD_TOKEN` is not set in the environment.
    #[error("DISCORD_TOKEN is not set")]
    MissingToken,

    /// A timeout duration that does not fit into a Discord timestamp.
    #[error("timeout duration is out of range")]
    InvalidTimeout,

    #[cfg(feature = "voice")]
    #[error("voice connection failed: {0}")]
    Voice(#[from] songbird::error::JoinError),
}
