//! Gateway event dispatch.
//!
//! [`Handler`] is the single serenity [`EventHandler`] the facade installs.
//! It routes incoming events to whatever closures were registered on the
//! [`Registry`] before login. Each handler runs in its own task so a slow
//! handler cannot stall the event loop; failures are logged and dropped.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};

use dashmap::DashMap;
use serenity::all::{
    ActivityData, ClientBuilder, CommandInteraction, ComponentInteraction,
    ComponentInteractionDataKind, Context, EventHandler, Guild, Interaction, Member, Message,
    OnlineStatus, Ready,
};
use tracing::{error, info};

use crate::client::Inner;
use crate::commands::SlashCommandDef;
use crate::error::Result;
use crate::invites::HttpInviteSource;

pub(crate) type BoxFuture<T> = futures::future::BoxFuture<'static, T>;

pub(crate) type MessageHandler =
    Arc<dyn Fn(Context, Message) -> BoxFuture<Result<()>> + Send + Sync>;
pub(crate) type SlashHandler =
    Arc<dyn Fn(Context, CommandInteraction) -> BoxFuture<Result<()>> + Send + Sync>;
pub(crate) type ComponentHandler =
    Arc<dyn Fn(Context, ComponentInteraction) -> BoxFuture<Result<()>> + Send + Sync>;
pub(crate) type MemberHandler = Arc<dyn Fn(Context, Member) -> BoxFuture<Result<()>> + Send + Sync>;
pub(crate) type ReadyHandler = Box<dyn FnOnce(Context) -> BoxFuture<Result<()>> + Send>;
pub(crate) type BuilderHook = Box<dyn FnOnce(ClientBuilder) -> ClientBuilder + Send>;

pub(crate) fn wrap_message<F, Fut>(handler: F) -> MessageHandler
where
    F: Fn(Context, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |ctx, msg| Box::pin(handler(ctx, msg)))
}

pub(crate) fn wrap_slash<F, Fut>(handler: F) -> SlashHandler
where
    F: Fn(Context, CommandInteraction) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |ctx, interaction| Box::pin(handler(ctx, interaction)))
}

pub(crate) fn wrap_component<F, Fut>(handler: F) -> ComponentHandler
where
    F: Fn(Context, ComponentInteraction) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |ctx, interaction| Box::pin(handler(ctx, interaction)))
}

pub(crate) fn wrap_member<F, Fut>(handler: F) -> MemberHandler
where
    F: Fn(Context, Member) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |ctx, member| Box::pin(handler(ctx, member)))
}

pub(crate) struct QueuedPresence {
    pub(crate) status: OnlineStatus,
    pub(crate) activity: Option<ActivityData>,
}

/// Everything registered on the facade before login.
pub(crate) struct Registry {
    pub(crate) prefix: StdRwLock<Option<String>>,
    pub(crate) triggers: DashMap<String, MessageHandler>,
    pub(crate) prefix_commands: DashMap<String, MessageHandler>,
    pub(crate) auto_replies: DashMap<String, String>,
    pub(crate) slash_handlers: DashMap<String, SlashHandler>,
    pub(crate) slash_defs: StdMutex<Vec<SlashCommandDef>>,
    pub(crate) button_handlers: DashMap<String, ComponentHandler>,
    pub(crate) any_button_handlers: StdRwLock<Vec<ComponentHandler>>,
    pub(crate) member_join_handlers: StdRwLock<Vec<MemberHandler>>,
    pub(crate) ready_handler: StdMutex<Option<ReadyHandler>>,
    pub(crate) presence: StdMutex<Option<QueuedPresence>>,
    pub(crate) extra_handlers: StdMutex<Vec<BuilderHook>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            prefix: StdRwLock::new(None),
            triggers: DashMap::new(),
            prefix_commands: DashMap::new(),
            auto_replies: DashMap::new(),
            slash_handlers: DashMap::new(),
            slash_defs: StdMutex::new(Vec::new()),
            button_handlers: DashMap::new(),
            any_button_handlers: StdRwLock::new(Vec::new()),
            member_join_handlers: StdRwLock::new(Vec::new()),
            ready_handler: StdMutex::new(None),
            presence: StdMutex::new(None),
            extra_handlers: StdMutex::new(Vec::new()),
        }
    }
}

fn spawn_message(kind: &'static str, handler: MessageHandler, ctx: Context, msg: Message) {
    tokio::spawn(async move {
        if let Err(err) = handler(ctx, msg).await {
            error!("Error in {} handler: {:?}", kind, err);
        }
    });
}

fn spawn_component(handler: ComponentHandler, ctx: Context, interaction: ComponentInteraction) {
    tokio::spawn(async move {
        if let Err(err) = handler(ctx, interaction).await {
            error!("Error in button handler: {:?}", err);
        }
    });
}

pub(crate) struct Handler {
    inner: Arc<Inner>,
    ready_fired: AtomicBool,
}

impl Handler {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self {
            inner,
            ready_fired: AtomicBool::new(false),
        }
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, data_about_bot: Ready) {
        info!(
            "Logged in as {} ({} guilds)",
            data_about_bot.user.name,
            data_about_bot.guilds.len()
        );

        // Ready can fire again on reconnect; the user callback runs once.
        if !self.ready_fired.swap(true, Ordering::SeqCst) {
            let callback = self.inner.registry.ready_handler.lock().unwrap().take();
            if let Some(callback) = callback {
                tokio::spawn(async move {
                    if let Err(err) = callback(ctx).await {
                        error!("Error in ready handler: {:?}", err);
                    }
                });
            }
        }
    }

    // Fired once per guild after ready and again when the bot is added
    // somewhere new; both cases want a fresh invite snapshot.
    async fn guild_create(&self, ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new.unwrap_or(false) {
            info!("Joined new guild {} ({})", guild.name, guild.id);
        }
        let inner = self.inner.clone();
        let source = HttpInviteSource::new(ctx.http.clone());
        let guild_id = guild.id;
        tokio::spawn(async move {
            inner.tracker.load_guild(&source, guild_id).await;
        });
    }

    async fn message(&self, ctx: Context, new_message: Message) {
        let registry = &self.inner.registry;
        let own_id = ctx.cache.current_user().id;

        let auto_reply = registry
            .auto_replies
            .get(new_message.content.as_str())
            .map(|entry| entry.value().clone());
        if let Some(reply) = auto_reply {
            // Replying to our own reply would loop forever.
            if new_message.author.id != own_id {
                let http = ctx.http.clone();
                let msg = new_message.clone();
                tokio::spawn(async move {
                    if let Err(err) = msg.reply(&http, reply).await {
                        error!("Failed to send auto reply: {:?}", err);
                    }
                });
            }
        }

        if new_message.author.bot {
            return;
        }

        let trigger = registry
            .triggers
            .get(new_message.content.as_str())
            .map(|entry| entry.value().clone());
        if let Some(handler) = trigger {
            spawn_message("command", handler, ctx.clone(), new_message.clone());
        }

        let prefix = registry.prefix.read().unwrap().clone();
        if let Some(prefix) = prefix {
            if let Some(name) = crate::commands::prefixed_command(&new_message.content, &prefix) {
                let handler = registry
                    .prefix_commands
                    .get(name)
                    .map(|entry| entry.value().clone());
                if let Some(handler) = handler {
                    spawn_message("prefix command", handler, ctx, new_message);
                }
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let registry = &self.inner.registry;
        match interaction {
            Interaction::Command(command) => {
                let handler = registry
                    .slash_handlers
                    .get(command.data.name.as_str())
                    .map(|entry| entry.value().clone());
                if let Some(handler) = handler {
                    tokio::spawn(async move {
                        if let Err(err) = handler(ctx, command).await {
                            error!("Error in slash command handler: {:?}", err);
                        }
                    });
                }
            }
            Interaction::Component(component) => {
                if !matches!(component.data.kind, ComponentInteractionDataKind::Button) {
                    return;
                }
                let keyed = registry
                    .button_handlers
                    .get(component.data.custom_id.as_str())
                    .map(|entry| entry.value().clone());
                if let Some(handler) = keyed {
                    spawn_component(handler, ctx.clone(), component.clone());
                }
                let catch_all = registry.any_button_handlers.read().unwrap().clone();
                for handler in catch_all {
                    spawn_component(handler, ctx.clone(), component.clone());
                }
            }
            _ => {}
        }
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        let handlers = self.inner.registry.member_join_handlers.read().unwrap().clone();
        for handler in handlers {
            let ctx = ctx.clone();
            let member = new_member.clone();
            tokio::spawn(async move {
                if let Err(err) = handler(ctx, member).await {
                    error!("Error in member join handler: {:?}", err);
                }
            });
        }
    }
}

/// Applies a presence change on a live gateway connection.
pub fn set_presence(ctx: &Context, status: OnlineStatus, activity: Option<ActivityData>) {
    ctx.set_presence(activity, status);
}
