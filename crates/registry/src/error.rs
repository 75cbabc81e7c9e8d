use {carlink_common::{ParticipantId, Tag}, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] carlink_common::Error),

    #[error("plate {tag} is already registered")]
    DuplicateTag { tag: Tag },

    #[error("participant {identity} already owns a plate")]
    IdentityTaken { identity: ParticipantId },

    #[error("plate {tag} not found")]
    NotFound { tag: Tag },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn duplicate_tag(tag: &Tag) -> Self {
        Self::DuplicateTag { tag: tag.clone() }
    }

    #[must_use]
    pub fn identity_taken(identity: ParticipantId) -> Self {
        Self::IdentityTaken { identity }
    }

    #[must_use]
    pub fn not_found(tag: &Tag) -> Self {
        Self::NotFound { tag: tag.clone() }
    }
}

impl carlink_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

carlink_common::impl_context!();
