//! A convenience layer over [serenity] for small Discord bots.
//!
//! The entry point is [`EzDiscord`]: build it from a token, register
//! closures for the events you care about, then call
//! [`login`](EzDiscord::login). One-line helpers cover messaging,
//! components, slash commands, and moderation, and an invite tracker can
//! tell you which invite a joining member used. Everything serenity exposes
//! stays reachable, the crate re-exports it and hands out the raw HTTP
//! client.
//!
//! ```no_run
//! use ezcord::EzDiscord;
//!
//! # async fn run() -> ezcord::Result<()> {
//! let bot = EzDiscord::from_env()?;
//! bot.set_prefix("!");
//!
//! let replies = bot.clone();
//! bot.prefix_command("ping", move |_ctx, msg| {
//!     let bot = replies.clone();
//!     async move {
//!         bot.send(msg.channel_id, "Pong!").await?;
//!         Ok(())
//!     }
//! });
//!
//! bot.login().await
//! # }
//! ```

pub mod channels;
pub mod client;
pub mod commands;
pub mod components;
pub mod error;
pub(crate) mod events;
pub mod invites;
pub mod members;
pub mod messages;
pub mod moderation;
#[cfg(feature = "voice")]
pub mod voice;

pub use channels::GuildInfo;
pub use client::{EzDiscord, DEFAULT_INTENTS};
pub use commands::{respond_to_command, respond_to_component, SlashCommandDef};
pub use components::{button, button_row, embed, link_button};
pub use error::{Error, Result};
pub use events::set_presence;
pub use invites::{
    HttpInviteSource, InviteEntry, InviteSource, InviteTracker, Inviter, JoinAttribution,
    UsedInvite,
};
pub use members::{has_role, mention, parse_user_arg};

pub use serenity;
