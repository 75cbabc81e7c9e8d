//! Tag lookup and pairing.

use {
    carlink_channels::Keyboard,
    carlink_common::{ParticipantId, Tag},
    carlink_registry::RegistryRecord,
    carlink_sessions::SessionState,
    tracing::{debug, info, warn},
};

use crate::{Result, prompts, service::PairingService};

/// Result of [`PairingService::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Input was not a plate; requester re-prompted and still searching.
    InvalidTag,
    /// Requester was not searching; nothing done.
    NotSearching,
    /// No reachable owner; requester back to `Idle`.
    NotRegistered { tag: Tag },
    /// The plate belongs to the requester; requester back to `Idle`.
    SelfMatch,
    /// Owner is paired with someone else; requester still searching.
    TargetBusy { target: ParticipantId },
    /// Pairing created.
    Paired { target: ParticipantId, tag: Tag },
    /// Owner could not be notified; pairing torn down, both `Idle`.
    TargetUnreachable { target: ParticipantId },
}

enum Claim {
    Paired,
    Busy,
    Stale,
}

impl PairingService {
    /// Find the record for `tag`: local registry first, then the external
    /// resolver. External hits are backfilled without an identity.
    pub async fn resolve(&self, tag: &Tag) -> Result<Option<RegistryRecord>> {
        if let Some(record) = self.store.get(tag).await? {
            return Ok(Some(record));
        }

        let plate = match self.resolver.lookup(tag).await {
            Ok(Some(plate)) => plate,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(%tag, error = %e, "external resolver failed, treating as not found");
                return Ok(None);
            },
        };

        let record = RegistryRecord::external(tag.clone(), plate);
        match self.store.insert(&record).await {
            Ok(()) => info!(%tag, "backfilled registry from external resolver"),
            Err(e) => warn!(%tag, error = %e, "failed to backfill external record"),
        }
        Ok(Some(record))
    }

    /// Handle a plate sent by a participant in `Searching`.
    pub async fn search(&self, requester: ParticipantId, raw_tag: &str) -> Result<SearchOutcome> {
        if self.sessions.state(requester) != SessionState::Searching {
            return Ok(SearchOutcome::NotSearching);
        }

        let Ok(tag) = Tag::parse(raw_tag) else {
            self.notify(requester, prompts::INVALID_PLATE, None).await;
            return Ok(SearchOutcome::InvalidTag);
        };

        let record = self.resolve(&tag).await?;
        let Some(target) = record.as_ref().and_then(|r| r.identity) else {
            debug!(participant = %requester, %tag, "no reachable owner");
            self.leave_search(requester);
            self.notify(
                requester,
                &prompts::not_registered(&tag),
                Some(Keyboard::MainMenu),
            )
            .await;
            return Ok(SearchOutcome::NotRegistered { tag });
        };

        if target == requester {
            self.leave_search(requester);
            self.notify(requester, prompts::SELF_MATCH, Some(Keyboard::MainMenu))
                .await;
            return Ok(SearchOutcome::SelfMatch);
        }

        let requester_tag = match self.store.find_by_identity(requester).await {
            Ok(own) => own.map(|r| r.tag),
            Err(e) => {
                warn!(participant = %requester, error = %e, "could not look up requester plate");
                None
            },
        };

        let claim = self.sessions.transact(|t| {
            if t.directory.get(requester) != &SessionState::Searching {
                return Claim::Stale;
            }
            if t.directory.get(target).is_paired() {
                return Claim::Busy;
            }
            t.pair(requester, requester_tag, target, tag.clone());
            Claim::Paired
        });

        match claim {
            Claim::Stale => return Ok(SearchOutcome::NotSearching),
            Claim::Busy => {
                info!(participant = %requester, %target, "target busy");
                self.notify(requester, prompts::TARGET_BUSY, None).await;
                return Ok(SearchOutcome::TargetBusy { target });
            },
            Claim::Paired => {},
        }

        if !self
            .deliver(target, prompts::SOMEONE_FOUND_YOU, Some(Keyboard::EndDialog))
            .await
        {
            warn!(participant = %requester, %target, "target unreachable, tearing down pairing");
            self.sessions.transact(|t| {
                if t.is_mutual(requester, target) {
                    t.reset_pair(requester, target);
                }
            });
            self.notify(
                requester,
                prompts::TARGET_UNREACHABLE,
                Some(Keyboard::MainMenu),
            )
            .await;
            return Ok(SearchOutcome::TargetUnreachable { target });
        }

        let direct = record
            .as_ref()
            .filter(|r| r.allow_direct)
            .and_then(|r| r.display_name.as_deref());
        info!(participant = %requester, %target, %tag, "paired");
        self.notify(
            requester,
            &prompts::found(&tag, direct),
            Some(Keyboard::EndDialog),
        )
        .await;
        Ok(SearchOutcome::Paired { target, tag })
    }

    fn leave_search(&self, requester: ParticipantId) {
        self.sessions.transact(|t| {
            t.compare_and_set(requester, &SessionState::Searching, SessionState::Idle)
        });
    }
}
