//! Routes inbound events to the component that owns the sender's state.

use {
    async_trait::async_trait,
    carlink_channels::{
        InboundKind, InboundMessage, InboundSink, Keyboard,
        keyboard::{END_DIALOG_BUTTON, SEARCH_BUTTON},
    },
    carlink_common::ParticipantId,
    carlink_sessions::SessionState,
    tracing::{debug, error},
};

use crate::{
    Result, prompts,
    registration::RegistrationInput,
    service::PairingService,
};

/// Commands recognised in text messages. Buttons map onto the same commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Search,
    Cancel,
    End,
}

fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    if text == SEARCH_BUTTON {
        return Some(Command::Search);
    }
    if text == END_DIALOG_BUTTON {
        return Some(Command::End);
    }
    // Telegram appends "@botname" to commands in groups.
    let command = text.strip_prefix('/')?.split(['@', ' ']).next()?;
    match command.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "search" => Some(Command::Search),
        "cancel" => Some(Command::Cancel),
        "end" => Some(Command::End),
        _ => None,
    }
}

impl PairingService {
    /// Handle one inbound event. Infrastructure errors are returned; the
    /// participant's state is left as it was.
    pub async fn handle(&self, message: &InboundMessage) -> Result<()> {
        let from = message.from;
        let state = self.sessions.state(from);
        debug!(participant = %from, state = state.name(), "inbound");

        let text = match &message.kind {
            InboundKind::Text(text) => text.trim(),
            InboundKind::Contact { phone, owner } => {
                if matches!(state, SessionState::Registering(_)) {
                    self.continue_registration(
                        from,
                        message.username.as_deref(),
                        RegistrationInput::Contact {
                            phone: phone.as_str(),
                            owner: *owner,
                        },
                    )
                    .await?;
                } else {
                    self.notify(from, prompts::CONTACT_UNEXPECTED, None).await;
                }
                return Ok(());
            },
        };
        let command = parse_command(text);

        if command == Some(Command::Start) {
            self.start_registration(from).await?;
            return Ok(());
        }

        match state {
            SessionState::Idle => match command {
                Some(Command::Search) => self.begin_search(from, &state).await,
                _ => self.notify(from, prompts::IDLE_HINT, Some(Keyboard::MainMenu)).await,
            },
            SessionState::Registering(_) => {
                if command == Some(Command::Cancel) {
                    self.cancel(from, &state).await;
                } else {
                    self.continue_registration(
                        from,
                        message.username.as_deref(),
                        RegistrationInput::Text(text),
                    )
                    .await?;
                }
            },
            SessionState::Searching => match command {
                Some(Command::Cancel) => self.cancel(from, &state).await,
                Some(Command::Search) => self.begin_search(from, &state).await,
                _ => {
                    self.search(from, text).await?;
                },
            },
            SessionState::AwaitingFirstMessage(_) | SessionState::InDialog(_) => match command {
                Some(Command::End) => {
                    self.request_termination(from).await;
                },
                Some(Command::Search | Command::Cancel) => {
                    self.notify(from, prompts::FINISH_DIALOG_FIRST, None).await;
                },
                _ => {
                    self.forward(from, text).await;
                },
            },
            SessionState::TerminationRequested { .. } => {
                self.notify(from, prompts::CONFIRMATION_PENDING, None).await;
            },
            SessionState::AwaitingTerminationAck { .. } => {
                self.answer_termination(from, text).await;
            },
        }
        Ok(())
    }

    async fn begin_search(&self, from: ParticipantId, current: &SessionState) {
        let moved = self
            .sessions
            .transact(|t| t.compare_and_set(from, current, SessionState::Searching));
        if moved {
            self.notify(from, prompts::ENTER_PLATE, Some(Keyboard::Remove))
                .await;
        }
    }

    async fn cancel(&self, from: ParticipantId, current: &SessionState) {
        let moved = self
            .sessions
            .transact(|t| t.compare_and_set(from, current, SessionState::Idle));
        if moved {
            self.notify(from, prompts::CANCELLED, Some(Keyboard::MainMenu))
                .await;
        }
    }
}

#[async_trait]
impl InboundSink for PairingService {
    async fn dispatch(&self, message: InboundMessage) {
        if let Err(e) = self.handle(&message).await {
            error!(participant = %message.from, error = %e, "failed to handle inbound message");
            self.notify(message.from, prompts::TRY_AGAIN, None).await;
        }
    }
}
