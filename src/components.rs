//! Short constructors for message components and embeds.
//!
//! These only shorten the common cases. The serenity builders they return
//! can be customized further before sending.

use serenity::all::{ButtonStyle, CreateActionRow, CreateButton, CreateEmbed, ReactionType};

/// A clickable button. The `custom_id` is what
/// [`on_button`](crate::EzDiscord::on_button) handlers are keyed by.
pub fn button(
    custom_id: impl Into<String>,
    label: impl Into<String>,
    style: ButtonStyle,
    emoji: Option<ReactionType>,
) -> CreateButton {
    let mut button = CreateButton::new(custom_id).label(label).style(style);
    if let Some(emoji) = emoji {
        button = button.emoji(emoji);
    }
    button
}

/// A button that opens a URL instead of firing an interaction. Link buttons
/// never reach button handlers.
pub fn link_button(url: impl Into<String>, label: impl Into<String>) -> CreateButton {
    CreateButton::new_link(url).label(label)
}

/// Lays out up to five buttons in one row.
pub fn button_row(buttons: Vec<CreateButton>) -> CreateActionRow {
    CreateActionRow::Buttons(buttons)
}

/// An embed with just a title and a description.
pub fn embed(title: impl Into<String>, description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new().title(title).description(description)
}
