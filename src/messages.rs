//! Sending, editing, deleting, and reacting to messages.

use std::time::Duration;

use serenity::all::{
    ChannelId, CreateActionRow, CreateEmbed, CreateMessage, EditMessage, GetMessages, Message,
    MessageId, ReactionType,
};

use crate::client::EzDiscord;
use crate::error::Result;

impl EzDiscord {
    /// Sends a plain text message.
    pub async fn send(&self, channel: ChannelId, content: impl Into<String>) -> Result<Message> {
        let message = channel.say(&self.inner.http, content).await?;
        Ok(message)
    }

    /// Replies to a message inline, without pinging its author.
    pub async fn reply(
        &self,
        replying_to: &Message,
        content: impl Into<String>,
    ) -> Result<Message> {
        let message = replying_to.reply(&self.inner.http, content).await?;
        Ok(message)
    }

    /// Sends a message consisting of a single embed.
    pub async fn send_embed(&self, channel: ChannelId, embed: CreateEmbed) -> Result<Message> {
        let message = channel
            .send_message(&self.inner.http, CreateMessage::new().embed(embed))
            .await?;
        Ok(message)
    }

    /// Sends text with component rows, and optionally an embed, in one
    /// message. Rows come from [`button_row`](crate::components::button_row).
    pub async fn send_with_components(
        &self,
        channel: ChannelId,
        content: impl Into<String>,
        rows: Vec<CreateActionRow>,
        embed: Option<CreateEmbed>,
    ) -> Result<Message> {
        let mut builder = CreateMessage::new().content(content).components(rows);
        if let Some(embed) = embed {
            builder = builder.embed(embed);
        }
        let message = channel.send_message(&self.inner.http, builder).await?;
        Ok(message)
    }

    /// Like [`send_with_components`](EzDiscord::send_with_components), but
    /// as a reply to an existing message.
    pub async fn reply_with_components(
        &self,
        replying_to: &Message,
        content: impl Into<String>,
        rows: Vec<CreateActionRow>,
        embed: Option<CreateEmbed>,
    ) -> Result<Message> {
        let mut builder = CreateMessage::new()
            .content(content)
            .components(rows)
            .reference_message(replying_to);
        if let Some(embed) = embed {
            builder = builder.embed(embed);
        }
        let message = replying_to
            .channel_id
            .send_message(&self.inner.http, builder)
            .await?;
        Ok(message)
    }

    /// Replaces a message's text, after an optional delay.
    pub async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: impl Into<String>,
        after: Option<Duration>,
    ) -> Result<()> {
        if let Some(delay) = after {
            tokio::time::sleep(delay).await;
        }
        channel
            .edit_message(&self.inner.http, message, EditMessage::new().content(content))
            .await?;
        Ok(())
    }

    /// Deletes a message, after an optional delay.
    pub async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        after: Option<Duration>,
    ) -> Result<()> {
        if let Some(delay) = after {
            tokio::time::sleep(delay).await;
        }
        channel.delete_message(&self.inner.http, message).await?;
        Ok(())
    }

    /// Deletes the newest `amount` messages of a channel in one call and
    /// returns how many were actually deleted. Discord caps this at 100
    /// messages, none older than two weeks.
    pub async fn bulk_delete(&self, channel: ChannelId, amount: u8) -> Result<usize> {
        let messages = channel
            .messages(&self.inner.http, GetMessages::new().limit(amount))
            .await?;
        let ids: Vec<MessageId> = messages.iter().map(|m| m.id).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        let count = ids.len();
        channel.delete_messages(&self.inner.http, ids).await?;
        Ok(count)
    }

    /// Adds a reaction to a message. A `char` works directly for unicode
    /// emoji.
    pub async fn react(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: impl Into<ReactionType>,
    ) -> Result<()> {
        channel
            .create_reaction(&self.inner.http, message, emoji)
            .await?;
        Ok(())
    }

    /// Adds several reactions in order, stopping at the first failure.
    pub async fn multi_react<I, R>(
        &self,
        channel: ChannelId,
        message: MessageId,
        emojis: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: Into<ReactionType>,
    {
        for emoji in emojis {
            self.react(channel, message, emoji).await?;
        }
        Ok(())
    }
}
