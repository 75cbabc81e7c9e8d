use thiserror::Error;

/// Infrastructure failures surfaced to the dispatcher.
///
/// Protocol outcomes (bad input, misses, delivery failures) are not errors;
/// they are reported through the outcome enums.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] carlink_registry::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
