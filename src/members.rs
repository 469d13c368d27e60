//! User and member lookups plus permission math.

use serenity::all::{GuildId, Member, Message, Permissions, RoleId, User, UserId};

use crate::client::EzDiscord;
use crate::error::Result;

/// Whether the member carries the given role.
pub fn has_role(member: &Member, role: RoleId) -> bool {
    member.roles.contains(&role)
}

/// The `<@123>` mention string for a user.
pub fn mention(user: UserId) -> String {
    format!("<@{user}>")
}

/// Parses a user id out of a raw mention or a bare id string.
/// Accepts `<@123>`, `<@!123>`, and `123`.
pub fn parse_user_arg(arg: &str) -> Option<UserId> {
    let inner = arg
        .strip_prefix("<@!")
        .or_else(|| arg.strip_prefix("<@"))
        .map_or(arg, |rest| rest.strip_suffix('>').unwrap_or(rest));
    let id: u64 = inner.parse().ok()?;
    if id == 0 {
        return None;
    }
    Some(UserId::new(id))
}

impl EzDiscord {
    /// Fetches a user by id.
    pub async fn get_user(&self, user: UserId) -> Result<User> {
        let user = self.inner.http.get_user(user).await?;
        Ok(user)
    }

    /// Fetches a guild member by id.
    pub async fn get_member(&self, guild: GuildId, user: UserId) -> Result<Member> {
        let member = guild.member(&self.inner.http, user).await?;
        Ok(member)
    }

    /// Computes a member's guild-level permissions from their roles. The
    /// guild owner and administrators resolve to all permissions. Channel
    /// overwrites are not applied.
    pub async fn member_permissions(&self, guild: GuildId, user: UserId) -> Result<Permissions> {
        let partial = guild.to_partial_guild(&self.inner.http).await?;
        if partial.owner_id == user {
            return Ok(Permissions::all());
        }
        let member = guild.member(&self.inner.http, user).await?;

        // The everyone role shares the guild's id.
        let everyone = RoleId::new(guild.get());
        let mut permissions = partial
            .roles
            .get(&everyone)
            .map_or(Permissions::empty(), |role| role.permissions);
        for role_id in &member.roles {
            if let Some(role) = partial.roles.get(role_id) {
                permissions |= role.permissions;
            }
        }
        if permissions.contains(Permissions::ADMINISTRATOR) {
            return Ok(Permissions::all());
        }
        Ok(permissions)
    }

    /// Whether the author of a message has the given guild-level
    /// permissions. Messages from interactions carry precomputed
    /// permissions and answer without a fetch; gateway messages fall back
    /// to [`member_permissions`](EzDiscord::member_permissions). Direct
    /// messages have no permissions at all.
    pub async fn author_has_permission(
        &self,
        message: &Message,
        permissions: Permissions,
    ) -> Result<bool> {
        if let Some(precomputed) = message.member.as_ref().and_then(|member| member.permissions) {
            return Ok(precomputed.contains(permissions));
        }
        let Some(guild_id) = message.guild_id else {
            return Ok(false);
        };
        let computed = self.member_permissions(guild_id, message.author.id).await?;
        Ok(computed.contains(permissions))
    }

    /// The user a command message points at: the first mention if there is
    /// one, otherwise the second whitespace token parsed as an id. Returns
    /// `None` when neither resolves to a real user.
    pub async fn mentioned_user(&self, message: &Message) -> Result<Option<User>> {
        if let Some(user) = message.mentions.first() {
            return Ok(Some(user.clone()));
        }
        let Some(arg) = message.content.split_whitespace().nth(1) else {
            return Ok(None);
        };
        let Some(id) = parse_user_arg(arg) else {
            return Ok(None);
        };
        // A well-formed id that matches no account is still "no user".
        match self.inner.http.get_user(id).await {
            Ok(user) => Ok(Some(user)),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_ids_and_both_mention_forms() {
        assert_eq!(parse_user_arg("123456"), Some(UserId::new(123456)));
        assert_eq!(parse_user_arg("<@123456>"), Some(UserId::new(123456)));
        assert_eq!(parse_user_arg("<@!123456>"), Some(UserId::new(123456)));
    }

    #[test]
    fn rejects_garbage_and_the_zero_id() {
        assert_eq!(parse_user_arg("abc"), None);
        assert_eq!(parse_user_arg("<@abc>"), None);
        assert_eq!(parse_user_arg(""), None);
        assert_eq!(parse_user_arg("0"), None);
        assert_eq!(parse_user_arg("<#123456>"), None);
    }

    #[test]
    fn mention_renders_the_angle_bracket_form() {
        assert_eq!(mention(UserId::new(42)), "<@42>");
    }
}
