use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock as StdRwLock};

use serenity::all::{
    ActivityData, ClientBuilder, CommandInteraction, ComponentInteraction, Context, EventHandler,
    GatewayIntents, GuildId, Http, Member, Message, OnlineStatus,
};
use tracing::info;

use crate::error::{Error, Result};
use crate::events::{self, Handler, QueuedPresence, Registry};
use crate::invites::{HttpInviteSource, InviteTracker, JoinAttribution};

/// The gateway intents a freshly constructed [`EzDiscord`] asks for. They
/// cover everything the built-in dispatch can route: guilds, message
/// content, members, presences, voice states, and invites.
pub const DEFAULT_INTENTS: GatewayIntents = GatewayIntents::GUILDS
    .union(GatewayIntents::GUILD_MESSAGES)
    .union(GatewayIntents::MESSAGE_CONTENT)
    .union(GatewayIntents::GUILD_MEMBERS)
    .union(GatewayIntents::GUILD_VOICE_STATES)
    .union(GatewayIntents::GUILD_PRESENCES)
    .union(GatewayIntents::GUILD_INVITES);

pub(crate) struct Inner {
    pub(crate) token: String,
    pub(crate) http: Arc<Http>,
    pub(crate) intents: StdRwLock<GatewayIntents>,
    pub(crate) registry: Registry,
    pub(crate) tracker: InviteTracker,
    #[cfg(feature = "voice")]
    pub(crate) songbird: Arc<songbird::Songbird>,
}

/// A thin handle over a Discord bot. Cloning is cheap and every clone talks
/// to the same connection, registries, and invite tracker.
///
/// Register handlers first, then call [`login`](EzDiscord::login), which
/// blocks until the gateway connection ends.
#[derive(Clone)]
pub struct EzDiscord {
    pub(crate) inner: Arc<Inner>,
}

impl EzDiscord {
    /// Builds a client from a bot token with [`DEFAULT_INTENTS`].
    pub fn new(token: impl AsRef<str>) -> Self {
        let token = token.as_ref().to_string();
        let http = Arc::new(Http::new(&token));
        Self {
            inner: Arc::new(Inner {
                token,
                http,
                intents: StdRwLock::new(DEFAULT_INTENTS),
                registry: Registry::new(),
                tracker: InviteTracker::new(),
                #[cfg(feature = "voice")]
                songbird: songbird::Songbird::serenity(),
            }),
        }
    }

    /// Builds a client from the `DISCORD_TOKEN` environment variable. An
    /// unset or empty variable is an error.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("DISCORD_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .ok_or(Error::MissingToken)?;
        Ok(Self::new(token))
    }

    /// Replaces the gateway intents requested at login.
    pub fn with_intents(self, intents: GatewayIntents) -> Self {
        *self.inner.intents.write().unwrap() = intents;
        self
    }

    /// Overrides how long join attribution waits before refetching invite
    /// counters.
    pub fn with_settle_delay(self, delay: std::time::Duration) -> Self {
        self.inner.tracker.set_settle_delay(delay);
        self
    }

    /// The raw HTTP client, for anything the facade does not wrap.
    pub fn http(&self) -> &Arc<Http> {
        &self.inner.http
    }

    /// The invite tracker behind [`attribute_join`](EzDiscord::attribute_join).
    pub fn invite_tracker(&self) -> &InviteTracker {
        &self.inner.tracker
    }

    /// Connects to the gateway and dispatches events until the connection
    /// ends. Everything registered on this handle before the call is live.
    pub async fn login(&self) -> Result<()> {
        let intents = *self.inner.intents.read().unwrap();
        let mut builder = ClientBuilder::new_with_http(self.gateway_http(), intents)
            .event_handler(Handler::new(self.inner.clone()));

        let presence = self.inner.registry.presence.lock().unwrap().take();
        if let Some(presence) = presence {
            builder = builder.status(presence.status);
            if let Some(activity) = presence.activity {
                builder = builder.activity(activity);
            }
        }

        let hooks = std::mem::take(&mut *self.inner.registry.extra_handlers.lock().unwrap());
        for hook in hooks {
            builder = hook(builder);
        }

        #[cfg(feature = "voice")]
        {
            builder = builder.voice_manager_arc(self.inner.songbird.clone());
        }

        let mut client = builder.await?;
        info!("Bot is starting...");
        client.start_autosharded().await?;
        Ok(())
    }

    // The serenity client takes its Http by value, so login builds it a
    // second one from the stored token. An application id already resolved
    // on the shared handle carries over.
    fn gateway_http(&self) -> Http {
        let http = Http::new(&self.inner.token);
        if let Some(application_id) = self.inner.http.application_id() {
            http.set_application_id(application_id);
        }
        http
    }

    /// Runs `handler` whenever a non-bot message matches `trigger` exactly.
    pub fn command<F, Fut>(&self, trigger: impl Into<String>, handler: F)
    where
        F: Fn(Context, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner
            .registry
            .triggers
            .insert(trigger.into(), events::wrap_message(handler));
    }

    /// Sets the prefix that [`prefix_command`](EzDiscord::prefix_command)
    /// handlers are matched under.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        *self.inner.registry.prefix.write().unwrap() = Some(prefix.into());
    }

    /// Runs `handler` for messages of the form `<prefix><name> ...`. Does
    /// nothing until a prefix is set.
    pub fn prefix_command<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Context, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner
            .registry
            .prefix_commands
            .insert(name.into(), events::wrap_message(handler));
    }

    /// Replies with a fixed text whenever a message matches `trigger`
    /// exactly. Unlike [`command`](EzDiscord::command) this also answers
    /// other bots, but never the client itself.
    pub fn auto_reply(&self, trigger: impl Into<String>, reply: impl Into<String>) {
        self.inner
            .registry
            .auto_replies
            .insert(trigger.into(), reply.into());
    }

    /// Runs `handler` when the slash command `name` is invoked. Pair with
    /// [`slash_command`](EzDiscord::slash_command) to define the command
    /// itself.
    pub fn on_slash_command<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Context, CommandInteraction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner
            .registry
            .slash_handlers
            .insert(name.into(), events::wrap_slash(handler));
    }

    /// Runs `handler` when a button with `custom_id` is clicked.
    pub fn on_button<F, Fut>(&self, custom_id: impl Into<String>, handler: F)
    where
        F: Fn(Context, ComponentInteraction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner
            .registry
            .button_handlers
            .insert(custom_id.into(), events::wrap_component(handler));
    }

    /// Runs `handler` for every button click, regardless of custom id.
    pub fn on_any_button<F, Fut>(&self, handler: F)
    where
        F: Fn(Context, ComponentInteraction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner
            .registry
            .any_button_handlers
            .write()
            .unwrap()
            .push(events::wrap_component(handler));
    }

    /// Runs `handler` whenever a member joins a guild.
    pub fn on_member_join<F, Fut>(&self, handler: F)
    where
        F: Fn(Context, Member) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner
            .registry
            .member_join_handlers
            .write()
            .unwrap()
            .push(events::wrap_member(handler));
    }

    /// Runs `handler` once, after the first ready event. Reconnects do not
    /// fire it again.
    pub fn on_ready<F, Fut>(&self, handler: F)
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        *self.inner.registry.ready_handler.lock().unwrap() =
            Some(Box::new(move |ctx| Box::pin(handler(ctx))));
    }

    /// Installs a raw serenity event handler next to the built-in dispatch,
    /// for events the facade has no registration method for.
    pub fn event_handler<H: EventHandler + 'static>(&self, handler: H) {
        // The builder's handler methods are generic over the concrete type,
        // so the registration is queued as the builder call itself.
        self.inner
            .registry
            .extra_handlers
            .lock()
            .unwrap()
            .push(Box::new(move |builder: ClientBuilder| {
                builder.event_handler(handler)
            }));
    }

    /// Sets the presence announced at login. Use
    /// [`set_presence`](crate::set_presence) to change it while connected.
    pub fn set_status(&self, status: OnlineStatus, activity: Option<ActivityData>) {
        *self.inner.registry.presence.lock().unwrap() = Some(QueuedPresence { status, activity });
    }

    /// Reloads the invite snapshots of the listed guilds. Login does this
    /// automatically for every guild the gateway reports; this exists for
    /// manual refreshes.
    pub async fn load_invites(&self, guilds: &[GuildId]) {
        let source = HttpInviteSource::new(self.inner.http.clone());
        self.inner.tracker.load_all(&source, guilds).await;
    }

    /// Works out which invite the most recent join in `guild` used. See
    /// [`InviteTracker::attribute_join`] for the exact semantics.
    pub async fn attribute_join(&self, guild: GuildId) -> Result<JoinAttribution> {
        let source = HttpInviteSource::new(self.inner.http.clone());
        self.inner.tracker.attribute_join(&source, guild).await
    }

    /// A copy of the tracked invite counters for `guild`, if it has been
    /// loaded.
    pub async fn invite_snapshot(&self, guild: GuildId) -> Option<HashMap<String, u64>> {
        self.inner.tracker.snapshot(guild).await
    }
}
