//! Invite-use attribution.
//!
//! Discord does not say which invite a member used to join. The only way to
//! find out is to keep a snapshot of every invite's use counter and, when a
//! member joins, fetch the counters again and look for the one that went up.
//! [`InviteTracker`] owns those snapshots and implements the diff.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serenity::all::{GuildId, Http, UserId};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{Error, Result};

/// How long [`InviteTracker::attribute_join`] waits before refetching by
/// default. Use counters are not updated atomically with the join event, so
/// an immediate fetch can still observe the stale value.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(800);

/// The user an invite belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inviter {
    pub id: UserId,
    pub name: String,
    pub tag: String,
}

/// One invite as seen by the tracker. Invites created by the guild itself
/// (widget or vanity invites) have no inviter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteEntry {
    pub code: String,
    pub uses: u64,
    pub inviter: Option<Inviter>,
}

/// The invite a join was attributed to, with its post-join use count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsedInvite {
    pub code: String,
    pub uses: u64,
    pub inviter_id: UserId,
    pub inviter_name: String,
    pub inviter_tag: String,
}

/// Outcome of [`InviteTracker::attribute_join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinAttribution {
    /// Exactly one candidate invite's counter increased and it has a known
    /// inviter.
    Invite(UsedInvite),
    /// No regular invite counter increased but the guild has a vanity URL,
    /// whose uses are not part of the regular invite list.
    Vanity { code: String },
    /// Nothing increased and there is no vanity URL. Happens for joins via
    /// widget invites, bot additions, or when the counters had not settled
    /// yet.
    Unknown,
}

/// Where invite data comes from. The live implementation is
/// [`HttpInviteSource`]; tests substitute scripted data.
#[serenity::async_trait]
pub trait InviteSource: Send + Sync {
    /// Lists every invite of the guild with its current use counter.
    async fn fetch_invites(&self, guild_id: GuildId) -> Result<Vec<InviteEntry>>;

    /// The guild's vanity URL code, if it has one. Failures degrade to
    /// `None` since most guilds have no vanity URL at all.
    async fn vanity_code(&self, guild_id: GuildId) -> Option<String>;
}

/// Fetches invites over the Discord REST API.
pub struct HttpInviteSource {
    http: Arc<Http>,
}

impl HttpInviteSource {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[serenity::async_trait]
impl InviteSource for HttpInviteSource {
    async fn fetch_invites(&self, guild_id: GuildId) -> Result<Vec<InviteEntry>> {
        let invites = guild_id
            .invites(&self.http)
            .await
            .map_err(|err| Error::InviteFetch {
                guild_id,
                reason: err.to_string(),
            })?;
        Ok(invites
            .into_iter()
            .map(|invite| InviteEntry {
                code: invite.code,
                uses: u64::from(invite.uses),
                inviter: invite.inviter.map(|user| Inviter {
                    id: user.id,
                    tag: user.tag(),
                    name: user.name,
                }),
            })
            .collect())
    }

    async fn vanity_code(&self, guild_id: GuildId) -> Option<String> {
        match guild_id.to_partial_guild(&self.http).await {
            Ok(guild) => guild.vanity_url_code,
            Err(err) => {
                warn!("Failed to fetch guild {} for vanity lookup: {}", guild_id, err);
                None
            }
        }
    }
}

/// Per-guild invite snapshots plus the join attribution diff.
///
/// Snapshots map invite codes to use counters. A guild's snapshot is guarded
/// by its own async mutex so that concurrent joins in the same guild are
/// attributed one at a time; joins in different guilds do not contend.
pub struct InviteTracker {
    snapshots: DashMap<GuildId, Arc<Mutex<HashMap<String, u64>>>>,
    settle_delay_ms: AtomicU64,
}

impl InviteTracker {
    pub fn new() -> Self {
        Self {
            snapshots: DashMap::new(),
            settle_delay_ms: AtomicU64::new(DEFAULT_SETTLE_DELAY.as_millis() as u64),
        }
    }

    /// Overrides the delay between a join and the counter refetch. Tests
    /// pass [`Duration::ZERO`].
    pub fn with_settle_delay(self, delay: Duration) -> Self {
        self.set_settle_delay(delay);
        self
    }

    pub fn set_settle_delay(&self, delay: Duration) {
        self.settle_delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms.load(Ordering::Relaxed))
    }

    /// Loads or reloads the snapshots of every listed guild.
    ///
    /// A guild whose fetch fails is stored with an empty snapshot rather
    /// than skipped, so later joins there degrade to [`JoinAttribution`]
    /// results instead of errors.
    pub async fn load_all<S: InviteSource>(&self, source: &S, guilds: &[GuildId]) {
        for &guild_id in guilds {
            self.load_guild(source, guild_id).await;
        }
    }

    /// Loads or reloads a single guild's snapshot, degrading to an empty
    /// one when the fetch fails.
    pub async fn load_guild<S: InviteSource>(&self, source: &S, guild_id: GuildId) {
        let entries = match source.fetch_invites(guild_id).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Failed to load invites for guild {}: {}", guild_id, err);
                Vec::new()
            }
        };
        *self.slot(guild_id).lock().await = snapshot_map(&entries);
    }

    /// Works out which invite the most recent join in `guild_id` used.
    ///
    /// Waits for the settle delay, refetches the guild's invites, and
    /// compares them against the stored snapshot. A code missing from the
    /// snapshot counts as zero previous uses. Of all codes whose counter
    /// increased, the lexicographically smallest wins, which keeps the
    /// result stable across fetch orderings. The fetched state then replaces
    /// the snapshot wholesale.
    ///
    /// Two joins through different invites inside one settle window are
    /// indistinguishable; the second one resolves against the already
    /// replaced snapshot. That is inherent to counter diffing, not
    /// recoverable here.
    ///
    /// A guild never seen by the tracker is loaded on demand first. Only
    /// that initial load may fail, with [`Error::UnknownGuild`]; a failing
    /// refetch degrades to an empty fetch result instead.
    pub async fn attribute_join<S: InviteSource>(
        &self,
        source: &S,
        guild_id: GuildId,
    ) -> Result<JoinAttribution> {
        if !self.snapshots.contains_key(&guild_id) {
            let initial = match source.fetch_invites(guild_id).await {
                Ok(entries) => entries,
                Err(err) => {
                    let reason = match err {
                        Error::InviteFetch { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    return Err(Error::UnknownGuild { guild_id, reason });
                }
            };
            *self.slot(guild_id).lock().await = snapshot_map(&initial);
        }

        let slot = self.slot(guild_id);
        let mut baseline = slot.lock().await;
        let old = baseline.clone();

        tokio::time::sleep(self.settle_delay()).await;

        let fetched = match source.fetch_invites(guild_id).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Invite refetch failed for guild {}: {}", guild_id, err);
                Vec::new()
            }
        };

        // Lexicographically smallest increased code wins; fetch order is
        // arbitrary.
        let mut used: Option<&InviteEntry> = None;
        for entry in &fetched {
            let old_uses = old.get(&entry.code).copied().unwrap_or(0);
            if entry.uses > old_uses && used.map_or(true, |best| entry.code < best.code) {
                used = Some(entry);
            }
        }

        let attributed = match used {
            Some(entry) => entry.inviter.as_ref().map(|inviter| {
                JoinAttribution::Invite(UsedInvite {
                    code: entry.code.clone(),
                    uses: entry.uses,
                    inviter_id: inviter.id,
                    inviter_name: inviter.name.clone(),
                    inviter_tag: inviter.tag.clone(),
                })
            }),
            None => None,
        };

        // The fetched state becomes the next baseline whether or not a
        // use was attributed, and even when the refetch came back empty.
        *baseline = snapshot_map(&fetched);
        drop(baseline);

        if let Some(attribution) = attributed {
            return Ok(attribution);
        }

        match source.vanity_code(guild_id).await {
            Some(code) => Ok(JoinAttribution::Vanity { code }),
            None => Ok(JoinAttribution::Unknown),
        }
    }

    /// A copy of the stored snapshot for `guild_id`, or `None` if the guild
    /// has never been loaded.
    pub async fn snapshot(&self, guild_id: GuildId) -> Option<HashMap<String, u64>> {
        let slot = match self.snapshots.get(&guild_id) {
            Some(slot) => slot.clone(),
            None => return None,
        };
        let map = slot.lock().await.clone();
        Some(map)
    }

    fn slot(&self, guild_id: GuildId) -> Arc<Mutex<HashMap<String, u64>>> {
        self.snapshots.entry(guild_id).or_default().clone()
    }
}

impl Default for InviteTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_map(entries: &[InviteEntry]) -> HashMap<String, u64> {
    entries
        .iter()
        .map(|entry| (entry.code.clone(), entry.uses))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    struct ScriptedSource {
        fetches: StdMutex<VecDeque<Result<Vec<InviteEntry>>>>,
        vanity: Option<String>,
    }

    impl ScriptedSource {
        fn new(fetches: Vec<Result<Vec<InviteEntry>>>) -> Self {
            Self {
                fetches: StdMutex::new(fetches.into()),
                vanity: None,
            }
        }

        fn with_vanity(mut self, code: &str) -> Self {
            self.vanity = Some(code.to_string());
            self
        }
    }

    #[serenity::async_trait]
    impl InviteSource for ScriptedSource {
        async fn fetch_invites(&self, _guild_id: GuildId) -> Result<Vec<InviteEntry>> {
            self.fetches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn vanity_code(&self, _guild_id: GuildId) -> Option<String> {
            self.vanity.clone()
        }
    }

    fn guild() -> GuildId {
        GuildId::new(1)
    }

    fn tracker() -> InviteTracker {
        InviteTracker::new().with_settle_delay(Duration::ZERO)
    }

    fn entry(code: &str, uses: u64) -> InviteEntry {
        InviteEntry {
            code: code.to_string(),
            uses,
            inviter: None,
        }
    }

    fn entry_by(code: &str, uses: u64, inviter_id: u64, name: &str) -> InviteEntry {
        InviteEntry {
            code: code.to_string(),
            uses,
            inviter: Some(Inviter {
                id: UserId::new(inviter_id),
                name: name.to_string(),
                tag: format!("{name}#0001"),
            }),
        }
    }

    fn fetch_error() -> Error {
        Error::InviteFetch {
            guild_id: guild(),
            reason: "missing permission".to_string(),
        }
    }

    #[tokio::test]
    async fn attributes_the_invite_whose_counter_increased() {
        let tracker = tracker();
        let source = ScriptedSource::new(vec![
            Ok(vec![entry_by("aaa", 5, 10, "alice"), entry_by("bbb", 3, 11, "bob")]),
            Ok(vec![entry_by("aaa", 5, 10, "alice"), entry_by("bbb", 4, 11, "bob")]),
        ]);

        tracker.load_all(&source, &[guild()]).await;
        let result = tracker.attribute_join(&source, guild()).await.unwrap();

        assert_eq!(
            result,
            JoinAttribution::Invite(UsedInvite {
                code: "bbb".to_string(),
                uses: 4,
                inviter_id: UserId::new(11),
                inviter_name: "bob".to_string(),
                inviter_tag: "bob#0001".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn unknown_when_no_counter_increased() {
        let tracker = tracker();
        let source = ScriptedSource::new(vec![
            Ok(vec![entry_by("aaa", 5, 10, "alice")]),
            Ok(vec![entry_by("aaa", 5, 10, "alice")]),
        ]);

        tracker.load_all(&source, &[guild()]).await;
        let result = tracker.attribute_join(&source, guild()).await.unwrap();

        assert_eq!(result, JoinAttribution::Unknown);
    }

    #[tokio::test]
    async fn vanity_fallback_when_no_counter_increased() {
        let tracker = tracker();
        let source = ScriptedSource::new(vec![
            Ok(vec![entry_by("aaa", 5, 10, "alice")]),
            Ok(vec![entry_by("aaa", 5, 10, "alice")]),
        ])
        .with_vanity("friends");

        tracker.load_all(&source, &[guild()]).await;
        let result = tracker.attribute_join(&source, guild()).await.unwrap();

        assert_eq!(
            result,
            JoinAttribution::Vanity {
                code: "friends".to_string()
            }
        );
    }

    #[tokio::test]
    async fn attribution_replaces_the_stored_snapshot() {
        let tracker = tracker();
        let source = ScriptedSource::new(vec![
            Ok(vec![entry_by("aaa", 5, 10, "alice"), entry_by("bbb", 3, 11, "bob")]),
            // "bbb" was revoked between the two fetches.
            Ok(vec![entry_by("aaa", 6, 10, "alice")]),
        ]);

        tracker.load_all(&source, &[guild()]).await;
        tracker.attribute_join(&source, guild()).await.unwrap();

        let snapshot = tracker.snapshot(guild()).await.unwrap();
        assert_eq!(snapshot, HashMap::from([("aaa".to_string(), 6)]));
    }

    #[tokio::test]
    async fn snapshot_is_none_until_the_guild_is_loaded() {
        let tracker = tracker();
        let source = ScriptedSource::new(vec![Ok(vec![entry("aaa", 4)])]);

        assert_eq!(tracker.snapshot(guild()).await, None);

        tracker.load_all(&source, &[guild()]).await;
        assert_eq!(
            tracker.snapshot(guild()).await,
            Some(HashMap::from([("aaa".to_string(), 4)]))
        );
    }

    #[tokio::test]
    async fn load_all_degrades_failed_guilds_to_empty_snapshots() {
        let tracker = tracker();
        let first = GuildId::new(1);
        let second = GuildId::new(2);
        let source = ScriptedSource::new(vec![
            Err(fetch_error()),
            Ok(vec![entry("ccc", 7)]),
        ]);

        tracker.load_all(&source, &[first, second]).await;

        assert_eq!(tracker.snapshot(first).await.unwrap(), HashMap::new());
        assert_eq!(
            tracker.snapshot(second).await.unwrap(),
            HashMap::from([("ccc".to_string(), 7)])
        );
    }

    #[tokio::test]
    async fn untracked_guild_is_loaded_on_demand_before_comparing() {
        let tracker = tracker();
        let source = ScriptedSource::new(vec![
            Ok(vec![entry_by("abc", 2, 10, "alice")]),
            Ok(vec![entry_by("abc", 3, 10, "alice"), entry("xyz", 0)]),
        ]);

        let result = tracker.attribute_join(&source, guild()).await.unwrap();

        assert_eq!(
            result,
            JoinAttribution::Invite(UsedInvite {
                code: "abc".to_string(),
                uses: 3,
                inviter_id: UserId::new(10),
                inviter_name: "alice".to_string(),
                inviter_tag: "alice#0001".to_string(),
            })
        );
        let snapshot = tracker.snapshot(guild()).await.unwrap();
        assert_eq!(
            snapshot,
            HashMap::from([("abc".to_string(), 3), ("xyz".to_string(), 0)])
        );
    }

    #[tokio::test]
    async fn unknown_guild_error_when_on_demand_load_fails() {
        let tracker = tracker();
        let source = ScriptedSource::new(vec![Err(fetch_error())]);

        let result = tracker.attribute_join(&source, guild()).await;

        match result {
            Err(Error::UnknownGuild { guild_id, reason }) => {
                assert_eq!(guild_id, guild());
                assert_eq!(reason, "missing permission");
            }
            other => panic!("expected UnknownGuild, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refetch_failure_degrades_to_unknown_and_empties_the_snapshot() {
        let tracker = tracker();
        let source = ScriptedSource::new(vec![
            Ok(vec![entry_by("aaa", 5, 10, "alice")]),
            Err(fetch_error()),
        ]);

        tracker.load_all(&source, &[guild()]).await;
        let result = tracker.attribute_join(&source, guild()).await.unwrap();

        assert_eq!(result, JoinAttribution::Unknown);
        assert_eq!(tracker.snapshot(guild()).await.unwrap(), HashMap::new());
    }

    #[tokio::test]
    async fn ties_resolve_to_the_lexicographically_smallest_code() {
        let tracker = tracker();
        // The refetch reports the increased codes in reverse order on
        // purpose; the outcome must not depend on fetch order.
        let source = ScriptedSource::new(vec![
            Ok(vec![entry_by("aaa", 1, 10, "alice"), entry_by("bbb", 1, 11, "bob")]),
            Ok(vec![entry_by("bbb", 2, 11, "bob"), entry_by("aaa", 2, 10, "alice")]),
        ]);

        tracker.load_all(&source, &[guild()]).await;
        let result = tracker.attribute_join(&source, guild()).await.unwrap();

        match result {
            JoinAttribution::Invite(used) => assert_eq!(used.code, "aaa"),
            other => panic!("expected an attributed invite, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn increase_without_inviter_falls_through_to_unknown() {
        let tracker = tracker();
        let source = ScriptedSource::new(vec![
            Ok(vec![entry("widget", 1)]),
            Ok(vec![entry("widget", 2)]),
        ]);

        tracker.load_all(&source, &[guild()]).await;
        let result = tracker.attribute_join(&source, guild()).await.unwrap();

        assert_eq!(result, JoinAttribution::Unknown);
    }

    #[tokio::test]
    async fn increase_without_inviter_still_reaches_the_vanity_fallback() {
        let tracker = tracker();
        let source = ScriptedSource::new(vec![
            Ok(vec![entry("widget", 1)]),
            Ok(vec![entry("widget", 2)]),
        ])
        .with_vanity("friends");

        tracker.load_all(&source, &[guild()]).await;
        let result = tracker.attribute_join(&source, guild()).await.unwrap();

        assert_eq!(
            result,
            JoinAttribution::Vanity {
                code: "friends".to_string()
            }
        );
    }

    #[tokio::test]
    async fn brand_new_code_counts_from_zero_previous_uses() {
        let tracker = tracker();
        let source = ScriptedSource::new(vec![
            Ok(Vec::new()),
            Ok(vec![entry_by("fresh", 1, 12, "carol")]),
        ]);

        tracker.load_all(&source, &[guild()]).await;
        let result = tracker.attribute_join(&source, guild()).await.unwrap();

        match result {
            JoinAttribution::Invite(used) => {
                assert_eq!(used.code, "fresh");
                assert_eq!(used.uses, 1);
            }
            other => panic!("expected an attributed invite, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn simultaneous_joins_in_one_guild_are_attributed_one_at_a_time() {
        let tracker = Arc::new(InviteTracker::new().with_settle_delay(Duration::from_millis(25)));
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![entry_by("aaa", 1, 10, "alice")]),
            Ok(vec![entry_by("aaa", 2, 10, "alice")]),
            Ok(vec![entry_by("aaa", 2, 10, "alice"), entry_by("bbb", 1, 11, "bob")]),
        ]));

        tracker.load_all(source.as_ref(), &[guild()]).await;

        // Whichever join wins the guild lock must commit its refetch before
        // the other starts diffing, so "aaa" is attributed exactly once.
        let joins = [
            tokio::spawn({
                let tracker = tracker.clone();
                let source = source.clone();
                async move { tracker.attribute_join(source.as_ref(), guild()).await }
            }),
            tokio::spawn({
                let tracker = tracker.clone();
                let source = source.clone();
                async move { tracker.attribute_join(source.as_ref(), guild()).await }
            }),
        ];

        let mut codes = Vec::new();
        for join in joins {
            match join.await.unwrap().unwrap() {
                JoinAttribution::Invite(used) => codes.push(used.code),
                other => panic!("expected an attributed invite, got {other:?}"),
            }
        }
        codes.sort();
        assert_eq!(codes, ["aaa", "bbb"]);

        let snapshot = tracker.snapshot(guild()).await.unwrap();
        assert_eq!(
            snapshot,
            HashMap::from([("aaa".to_string(), 2), ("bbb".to_string(), 1)])
        );
    }

    #[test]
    fn settle_delay_defaults_to_the_documented_constant() {
        assert_eq!(InviteTracker::new().settle_delay(), DEFAULT_SETTLE_DELAY);
    }
}
