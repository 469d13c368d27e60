//! Slash command definitions and publishing.

use serenity::all::{
    CacheHttp, Command, CommandInteraction, CommandOptionType, ComponentInteraction, CreateCommand,
    CreateCommandOption, CreateInteractionResponse, CreateInteractionResponseMessage, GuildId,
};
use tracing::info;

use crate::client::EzDiscord;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlashOptionKind {
    String,
    User,
    Channel,
}

#[derive(Debug, Clone)]
struct SlashOption {
    kind: SlashOptionKind,
    name: String,
    description: String,
    required: bool,
}

/// A slash command to be published, described by name, description, and a
/// flat list of options.
#[derive(Debug, Clone)]
pub struct SlashCommandDef {
    name: String,
    description: String,
    options: Vec<SlashOption>,
}

impl SlashCommandDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a free-text option.
    pub fn string_option(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.option(SlashOptionKind::String, name, description, required)
    }

    /// Adds a user picker option.
    pub fn user_option(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.option(SlashOptionKind::User, name, description, required)
    }

    /// Adds a channel picker option.
    pub fn channel_option(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.option(SlashOptionKind::Channel, name, description, required)
    }

    fn option(
        mut self,
        kind: SlashOptionKind,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.options.push(SlashOption {
            kind,
            name: name.into(),
            description: description.into(),
            required,
        });
        self
    }

    pub(crate) fn build(&self) -> CreateCommand {
        let mut command = CreateCommand::new(&self.name).description(&self.description);
        for option in &self.options {
            let kind = match option.kind {
                SlashOptionKind::String => CommandOptionType::String,
                SlashOptionKind::User => CommandOptionType::User,
                SlashOptionKind::Channel => CommandOptionType::Channel,
            };
            command = command.add_option(
                CreateCommandOption::new(kind, &option.name, &option.description)
                    .required(option.required),
            );
        }
        command
    }
}

impl EzDiscord {
    /// Queues a slash command definition for the next
    /// [`register_slash_commands`](EzDiscord::register_slash_commands) call.
    pub fn slash_command(&self, def: SlashCommandDef) {
        self.inner.registry.slash_defs.lock().unwrap().push(def);
    }

    /// Publishes every queued definition, to one guild or globally.
    ///
    /// Guild commands appear immediately and suit development; global
    /// commands take up to an hour to roll out. Safe to call before login,
    /// the application id is resolved over HTTP on first use.
    pub async fn register_slash_commands(&self, guild: Option<GuildId>) -> Result<()> {
        self.ensure_application_id().await?;
        let commands: Vec<CreateCommand> = self
            .inner
            .registry
            .slash_defs
            .lock()
            .unwrap()
            .iter()
            .map(SlashCommandDef::build)
            .collect();
        let count = commands.len();
        match guild {
            Some(guild) => {
                guild.set_commands(&self.inner.http, commands).await?;
                info!("Registered {} commands in guild {}", count, guild);
            }
            None => {
                Command::set_global_commands(&self.inner.http, commands).await?;
                info!("Registered {} commands globally", count);
            }
        }
        Ok(())
    }

    /// Deletes every published command, in one guild or globally. Queued
    /// definitions are untouched.
    pub async fn clear_slash_commands(&self, guild: Option<GuildId>) -> Result<()> {
        self.ensure_application_id().await?;
        match guild {
            Some(guild) => {
                guild.set_commands(&self.inner.http, Vec::new()).await?;
                info!("Cleared commands in guild {}", guild);
            }
            None => {
                Command::set_global_commands(&self.inner.http, Vec::new()).await?;
                info!("Cleared global commands");
            }
        }
        Ok(())
    }

    /// Command publishing needs the application id, which serenity only
    /// learns at login. Fetch it when registering earlier than that.
    async fn ensure_application_id(&self) -> Result<()> {
        if self.inner.http.application_id().is_none() {
            let app = self.inner.http.get_current_application_info().await?;
            self.inner.http.set_application_id(app.id);
        }
        Ok(())
    }
}

/// Answers a slash command with a plain text message.
pub async fn respond_to_command(
    cache_http: impl CacheHttp,
    interaction: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new().content(content),
    );
    interaction.create_response(cache_http, response).await?;
    Ok(())
}

/// Answers a button click with a plain text message.
pub async fn respond_to_component(
    cache_http: impl CacheHttp,
    interaction: &ComponentInteraction,
    content: impl Into<String>,
) -> Result<()> {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new().content(content),
    );
    interaction.create_response(cache_http, response).await?;
    Ok(())
}

/// Extracts the command name from a prefixed message, if it has one.
/// `"!kick @user spam"` with prefix `"!"` yields `"kick"`.
pub(crate) fn prefixed_command<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = content.strip_prefix(prefix)?;
    rest.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_command_takes_the_first_token() {
        assert_eq!(prefixed_command("!kick @user spam", "!"), Some("kick"));
        assert_eq!(prefixed_command("!ping", "!"), Some("ping"));
        assert_eq!(prefixed_command("?ping", "!"), None);
        assert_eq!(prefixed_command("ping", "!"), None);
        assert_eq!(prefixed_command("!", "!"), None);
        assert_eq!(prefixed_command("!  ", "!"), None);
    }

    #[test]
    fn definitions_build_the_expected_payload() {
        let def = SlashCommandDef::new("greet", "Greet a user")
            .string_option("message", "What to say", true)
            .user_option("target", "Who to greet", false)
            .channel_option("where", "Channel to post in", false);

        let payload = serde_json::to_value(def.build()).unwrap();
        assert_eq!(payload["name"], "greet");
        assert_eq!(payload["description"], "Greet a user");

        let options = payload["options"].as_array().unwrap();
        assert_eq!(options.len(), 3);
        // Option type ids are fixed by the Discord API: 3 string, 6 user,
        // 7 channel.
        assert_eq!(options[0]["type"], 3);
        assert_eq!(options[0]["name"], "message");
        assert_eq!(options[0]["required"], true);
        assert_eq!(options[1]["type"], 6);
        assert_eq!(options[1]["name"], "target");
        assert_eq!(options[2]["type"], 7);
        assert_eq!(options[2]["name"], "where");
    }

    #[test]
    fn queued_definitions_accumulate() {
        let bot = EzDiscord::new("token");
        bot.slash_command(SlashCommandDef::new("one", "first"));
        bot.slash_command(SlashCommandDef::new("two", "second"));

        let defs = bot.inner.registry.slash_defs.lock().unwrap();
        let names: Vec<&str> = defs.iter().map(SlashCommandDef::name).collect();
        assert_eq!(names, vec!["one", "two"]);
    }
}
