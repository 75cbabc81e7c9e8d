//! Onboarding: phone contact, plate, handle visibility.

use {
    carlink_channels::Keyboard,
    carlink_common::{ParticipantId, Tag},
    carlink_registry::{RecordPatch, RegistryRecord},
    carlink_sessions::{RegistrationStep, SessionState},
    tracing::{debug, info},
};

use crate::{Result, prompts, service::PairingService};

/// Result of a registration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Already owns a plate; nothing to do.
    AlreadyRegistered { tag: Tag },
    /// Moved to the next step.
    Advanced(RegistrationStep),
    /// Input rejected; step unchanged.
    Reprompted,
    /// Plate owned by someone else; step unchanged.
    PlateTaken { tag: Tag },
    /// Record written; participant `Idle`.
    Registered { tag: Tag },
    /// Participant is paired or their state moved on meanwhile.
    Unavailable,
}

/// What a participant sent during registration.
#[derive(Debug, Clone, Copy)]
pub enum RegistrationInput<'a> {
    Text(&'a str),
    Contact {
        phone: &'a str,
        owner: Option<ParticipantId>,
    },
}

impl PairingService {
    /// `/start`: begin registration unless the participant already owns a
    /// plate.
    pub async fn start_registration(&self, from: ParticipantId) -> Result<RegistrationOutcome> {
        let current = self.sessions.state(from);
        if current.is_paired() {
            self.notify(from, prompts::FINISH_DIALOG_FIRST, None).await;
            return Ok(RegistrationOutcome::Unavailable);
        }

        if let Some(record) = self.store.find_by_identity(from).await? {
            self.sessions
                .transact(|t| t.compare_and_set(from, &current, SessionState::Idle));
            self.notify(
                from,
                &prompts::already_registered(&record.tag),
                Some(Keyboard::MainMenu),
            )
            .await;
            return Ok(RegistrationOutcome::AlreadyRegistered { tag: record.tag });
        }

        let step = RegistrationStep::AwaitingPhone;
        if !self.advance(from, &current, step.clone()) {
            return Ok(RegistrationOutcome::Unavailable);
        }
        self.notify(from, prompts::SHARE_CONTACT, Some(Keyboard::ShareContact))
            .await;
        Ok(RegistrationOutcome::Advanced(step))
    }

    /// Feed one input to the registration step the participant is in.
    pub async fn continue_registration(
        &self,
        from: ParticipantId,
        username: Option<&str>,
        input: RegistrationInput<'_>,
    ) -> Result<RegistrationOutcome> {
        let current = self.sessions.state(from);
        let SessionState::Registering(step) = &current else {
            return Ok(RegistrationOutcome::Unavailable);
        };

        match (step, input) {
            (RegistrationStep::AwaitingPhone, RegistrationInput::Contact { phone, owner }) => {
                if owner.is_some_and(|owner| owner != from) {
                    self.notify(from, prompts::OWN_CONTACT_ONLY, Some(Keyboard::ShareContact))
                        .await;
                    return Ok(RegistrationOutcome::Reprompted);
                }
                let next = RegistrationStep::AwaitingPlate {
                    phone: phone.trim().to_string(),
                };
                if !self.advance(from, &current, next.clone()) {
                    return Ok(RegistrationOutcome::Unavailable);
                }
                self.notify(from, prompts::ENTER_OWN_PLATE, Some(Keyboard::Remove))
                    .await;
                Ok(RegistrationOutcome::Advanced(next))
            },
            (RegistrationStep::AwaitingPhone, RegistrationInput::Text(_)) => {
                self.notify(from, prompts::SHARE_CONTACT, Some(Keyboard::ShareContact))
                    .await;
                Ok(RegistrationOutcome::Reprompted)
            },
            (RegistrationStep::AwaitingPlate { phone }, RegistrationInput::Text(text)) => {
                let Ok(tag) = Tag::parse(text) else {
                    self.notify(from, prompts::INVALID_PLATE, None).await;
                    return Ok(RegistrationOutcome::Reprompted);
                };
                if self.owned_by_other(&tag, from).await? {
                    self.notify(from, prompts::PLATE_TAKEN, None).await;
                    return Ok(RegistrationOutcome::PlateTaken { tag });
                }
                let next = RegistrationStep::AwaitingAllowDirect {
                    phone: phone.clone(),
                    tag,
                };
                if !self.advance(from, &current, next.clone()) {
                    return Ok(RegistrationOutcome::Unavailable);
                }
                self.notify(from, prompts::ALLOW_DIRECT, Some(Keyboard::YesNo))
                    .await;
                Ok(RegistrationOutcome::Advanced(next))
            },
            (RegistrationStep::AwaitingAllowDirect { phone, tag }, RegistrationInput::Text(text)) => {
                let Some(allow_direct) = prompts::parse_answer(text) else {
                    self.notify(from, prompts::ANSWER_YES_NO, Some(Keyboard::YesNo))
                        .await;
                    return Ok(RegistrationOutcome::Reprompted);
                };
                self.finish_registration(from, &current, phone, tag, username, allow_direct)
                    .await
            },
            (_, RegistrationInput::Contact { .. }) => {
                debug!(participant = %from, "contact outside the phone step ignored");
                Ok(RegistrationOutcome::Reprompted)
            },
        }
    }

    async fn finish_registration(
        &self,
        from: ParticipantId,
        current: &SessionState,
        phone: &str,
        tag: &Tag,
        username: Option<&str>,
        allow_direct: bool,
    ) -> Result<RegistrationOutcome> {
        let record = RegistryRecord::local(
            from,
            tag.clone(),
            Some(phone.to_string()),
            username.map(str::to_string),
            allow_direct,
        );

        match self.store.get(tag).await? {
            Some(existing) if existing.identity.is_some_and(|owner| owner != from) => {
                let back = RegistrationStep::AwaitingPlate {
                    phone: phone.to_string(),
                };
                self.advance(from, current, back);
                self.notify(from, prompts::PLATE_TAKEN, None).await;
                self.notify(from, prompts::ENTER_OWN_PLATE, None).await;
                return Ok(RegistrationOutcome::PlateTaken { tag: tag.clone() });
            },
            Some(_) => {
                self.store.update(tag, &RecordPatch::claim(&record)).await?;
            },
            None => self.store.insert(&record).await?,
        }

        info!(participant = %from, %tag, allow_direct, "registered");
        self.sessions
            .transact(|t| t.compare_and_set(from, current, SessionState::Idle));
        self.notify(from, &prompts::registered(tag), Some(Keyboard::MainMenu))
            .await;
        Ok(RegistrationOutcome::Registered { tag: tag.clone() })
    }

    async fn owned_by_other(&self, tag: &Tag, from: ParticipantId) -> Result<bool> {
        Ok(self
            .store
            .get(tag)
            .await?
            .and_then(|record| record.identity)
            .is_some_and(|owner| owner != from))
    }

    /// Move `from` to `step` if their state is still `current`.
    fn advance(&self, from: ParticipantId, current: &SessionState, step: RegistrationStep) -> bool {
        self.sessions
            .transact(|t| t.compare_and_set(from, current, SessionState::Registering(step)))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{Harness, tag},
        carlink_registry::{ExternalPlate, Provenance, RegistryStore},
    };

    const A: ParticipantId = ParticipantId(1);
    const B: ParticipantId = ParticipantId(2);

    async fn walk_to_plate(h: &Harness) {
        h.service.start_registration(A).await.unwrap();
        h.service
            .continue_registration(A, Some("alice"), RegistrationInput::Contact {
                phone: " +15550001 ",
                owner: Some(A),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn full_registration_writes_local_record() {
        let h = Harness::new();
        walk_to_plate(&h).await;
        assert_eq!(
            h.state(A),
            SessionState::Registering(RegistrationStep::AwaitingPlate {
                phone: "+15550001".into()
            })
        );

        h.service
            .continue_registration(A, Some("alice"), RegistrationInput::Text("ab 123"))
            .await
            .unwrap();
        let outcome = h
            .service
            .continue_registration(A, Some("alice"), RegistrationInput::Text("yes"))
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Registered { tag: tag("AB123") });
        assert_eq!(h.state(A), SessionState::Idle);

        let record = h.store.get(&tag("AB123")).await.unwrap().unwrap();
        assert_eq!(record.identity, Some(A));
        assert!(record.allow_direct);
        assert!(record.verified);
        assert_eq!(record.provenance, Provenance::Local);
        assert_eq!(record.display_name.as_deref(), Some("alice"));
        assert_eq!(
            h.outbound.last_to(A).unwrap().keyboard,
            Some(Keyboard::MainMenu)
        );
    }

    #[tokio::test]
    async fn already_registered_stays_idle() {
        let h = Harness::new();
        h.register(A, "AA111", false).await;
        let outcome = h.service.start_registration(A).await.unwrap();
        assert_eq!(outcome, RegistrationOutcome::AlreadyRegistered {
            tag: tag("AA111")
        });
        assert_eq!(h.state(A), SessionState::Idle);
    }

    #[tokio::test]
    async fn foreign_contact_is_rejected() {
        let h = Harness::new();
        h.service.start_registration(A).await.unwrap();
        let outcome = h
            .service
            .continue_registration(A, None, RegistrationInput::Contact {
                phone: "+1",
                owner: Some(B),
            })
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Reprompted);
        assert_eq!(
            h.state(A),
            SessionState::Registering(RegistrationStep::AwaitingPhone)
        );
    }

    #[tokio::test]
    async fn plate_owned_by_someone_else_is_rejected() {
        let h = Harness::new();
        h.register(B, "AB123", false).await;
        walk_to_plate(&h).await;
        let outcome = h
            .service
            .continue_registration(A, None, RegistrationInput::Text("AB123"))
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::PlateTaken { tag: tag("AB123") });
        assert!(matches!(
            h.state(A),
            SessionState::Registering(RegistrationStep::AwaitingPlate { .. })
        ));
    }

    #[tokio::test]
    async fn claims_external_record() {
        let h = Harness::new();
        h.store
            .insert(&RegistryRecord::external(tag("AB123"), ExternalPlate::default()))
            .await
            .unwrap();
        walk_to_plate(&h).await;
        h.service
            .continue_registration(A, None, RegistrationInput::Text("AB123"))
            .await
            .unwrap();
        h.service
            .continue_registration(A, None, RegistrationInput::Text("нет"))
            .await
            .unwrap();

        let record = h.store.get(&tag("AB123")).await.unwrap().unwrap();
        assert_eq!(record.identity, Some(A));
        assert_eq!(record.provenance, Provenance::Local);
        assert!(!record.allow_direct);
    }

    #[tokio::test]
    async fn malformed_answer_reprompts() {
        let h = Harness::new();
        walk_to_plate(&h).await;
        h.service
            .continue_registration(A, None, RegistrationInput::Text("AB123"))
            .await
            .unwrap();
        let outcome = h
            .service
            .continue_registration(A, None, RegistrationInput::Text("perhaps"))
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Reprompted);
        assert!(h.store.get(&tag("AB123")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn start_while_paired_is_refused() {
        let h = Harness::new();
        h.in_dialog(A, B).await;
        assert_eq!(
            h.service.start_registration(A).await.unwrap(),
            RegistrationOutcome::Unavailable
        );
        assert!(h.state(A).is_paired());
    }
}
