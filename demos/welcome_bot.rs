use anyhow::Context as _;
use clap::Parser;
use ezcord::serenity::all::{ActivityData, ChannelId, GuildId, OnlineStatus};
use ezcord::{EzDiscord, JoinAttribution, SlashCommandDef};
use tracing::info;

#[derive(Parser)]
#[command(about = "A welcome bot that credits the inviter of every new member")]
struct Args {
    /// Publish the slash commands to one guild and exit.
    #[arg(long)]
    register: Option<u64>,
    /// Publish the slash commands globally and exit.
    #[arg(long)]
    register_global: bool,
    /// Delete the published slash commands instead of publishing them.
    #[arg(long)]
    clear: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let bot = EzDiscord::from_env().context("building the client")?;

    bot.slash_command(
        SlashCommandDef::new("greet", "Greet someone by name")
            .string_option("name", "Who to greet", false),
    );

    if args.register.is_some() || args.register_global || args.clear {
        let guild = args.register.map(GuildId::new);
        if args.clear {
            bot.clear_slash_commands(guild).await?;
        } else {
            bot.register_slash_commands(guild).await?;
        }
        return Ok(());
    }

    bot.set_status(OnlineStatus::Online, Some(ActivityData::watching("the door")));
    bot.set_prefix("!");
    bot.auto_reply("good bot", "thank you!");

    let pong = bot.clone();
    bot.prefix_command("ping", move |_ctx, msg| {
        let bot = pong.clone();
        async move {
            bot.send(msg.channel_id, "Pong!").await?;
            Ok(())
        }
    });

    bot.on_slash_command("greet", |ctx, command| async move {
        let name = command
            .data
            .options
            .first()
            .and_then(|option| option.value.as_str())
            .unwrap_or("world")
            .to_string();
        ezcord::respond_to_command(&ctx.http, &command, format!("Hello, {name}!")).await
    });

    let welcome_channel: Option<ChannelId> = std::env::var("WELCOME_CHANNEL_ID")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .filter(|id| *id != 0)
        .map(ChannelId::new);
    if welcome_channel.is_none() {
        info!("WELCOME_CHANNEL_ID is not set, join announcements are disabled");
    }

    let welcomer = bot.clone();
    bot.on_member_join(move |_ctx, member| {
        let bot = welcomer.clone();
        async move {
            let Some(channel) = welcome_channel else {
                return Ok(());
            };
            let text = match bot.attribute_join(member.guild_id).await? {
                JoinAttribution::Invite(invite) => format!(
                    "Welcome <@{}>! Invited by {} with `{}` ({} uses).",
                    member.user.id, invite.inviter_name, invite.code, invite.uses
                ),
                JoinAttribution::Vanity { code } => format!(
                    "Welcome <@{}>! Came in through the vanity link `{}`.",
                    member.user.id, code
                ),
                JoinAttribution::Unknown => format!("Welcome <@{}>!", member.user.id),
            };
            bot.send(channel, text).await?;
            Ok(())
        }
    });

    bot.login().await.context("client error")
}
