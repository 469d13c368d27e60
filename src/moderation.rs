//! Kicks, bans, timeouts, and role management.
//!
//! Every operation takes an optional audit log reason. These calls fail
//! with a permission error when the bot's highest role is not above the
//! target's; Discord enforces the hierarchy server side.

use std::time::Duration;

use serenity::all::{EditMember, EditRole, GuildId, Member, Role, RoleId, Timestamp, UserId};

use crate::client::EzDiscord;
use crate::error::{Error, Result};

impl EzDiscord {
    /// Removes a member from a guild. They can rejoin with a new invite.
    pub async fn kick(&self, guild: GuildId, user: UserId, reason: Option<&str>) -> Result<()> {
        match reason {
            Some(reason) => guild.kick_with_reason(&self.inner.http, user, reason).await?,
            None => guild.kick(&self.inner.http, user).await?,
        }
        Ok(())
    }

    /// Bans a user from a guild without deleting their message history.
    pub async fn ban(&self, guild: GuildId, user: UserId, reason: Option<&str>) -> Result<()> {
        match reason {
            Some(reason) => guild.ban_with_reason(&self.inner.http, user, 0, reason).await?,
            None => guild.ban(&self.inner.http, user, 0).await?,
        }
        Ok(())
    }

    /// Lifts a ban.
    pub async fn unban(&self, guild: GuildId, user: UserId, reason: Option<&str>) -> Result<()> {
        self.inner.http.remove_ban(guild, user, reason).await?;
        Ok(())
    }

    /// Times a member out for a duration, measured from now. Discord caps
    /// timeouts at 28 days; longer durations are rejected by the API.
    pub async fn timeout(
        &self,
        guild: GuildId,
        user: UserId,
        duration: Duration,
        reason: Option<&str>,
    ) -> Result<Member> {
        let until = Timestamp::now()
            .unix_timestamp()
            .checked_add(i64::try_from(duration.as_secs()).map_err(|_| Error::InvalidTimeout)?)
            .ok_or(Error::InvalidTimeout)?;
        let until = Timestamp::from_unix_timestamp(until).map_err(|_| Error::InvalidTimeout)?;

        let member = guild
            .edit_member(&self.inner.http, user, timeout_edit(until, reason))
            .await?;
        Ok(member)
    }

    /// Ends a member's timeout early.
    pub async fn remove_timeout(
        &self,
        guild: GuildId,
        user: UserId,
        reason: Option<&str>,
    ) -> Result<Member> {
        let member = guild
            .edit_member(&self.inner.http, user, clear_timeout_edit(reason))
            .await?;
        Ok(member)
    }

    /// Gives a member a role.
    pub async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: Option<&str>,
    ) -> Result<()> {
        self.inner
            .http
            .add_member_role(guild, user, role, reason)
            .await?;
        Ok(())
    }

    /// Takes a role away from a member.
    pub async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: Option<&str>,
    ) -> Result<()> {
        self.inner
            .http
            .remove_member_role(guild, user, role, reason)
            .await?;
        Ok(())
    }

    /// Creates a role with default permissions and color.
    pub async fn create_role(
        &self,
        guild: GuildId,
        name: impl Into<String>,
        reason: Option<&str>,
    ) -> Result<Role> {
        let mut edit = EditRole::new().name(name);
        if let Some(reason) = reason {
            edit = edit.audit_log_reason(reason);
        }
        let role = guild.create_role(&self.inner.http, edit).await?;
        Ok(role)
    }
}

fn timeout_edit(until: Timestamp, reason: Option<&str>) -> EditMember<'_> {
    let mut edit = EditMember::new().disable_communication_until_datetime(until);
    if let Some(reason) = reason {
        edit = edit.audit_log_reason(reason);
    }
    edit
}

fn clear_timeout_edit(reason: Option<&str>) -> EditMember<'_> {
    let mut edit = EditMember::new().enable_communication();
    if let Some(reason) = reason {
        edit = edit.audit_log_reason(reason);
    }
    edit
}
