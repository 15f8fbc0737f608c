use std::{num::ParseIntError, time::Duration};

use thiserror::Error;

use crate::classify::Kind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("destination chat id {value:?} is not an integer: {source}")]
    InvalidDestination {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("nothing to dispatch for {kind} message")]
    NothingToDispatch { kind: Kind },

    #[error(transparent)]
    Channel(#[from] courier_channels::Error),
}

impl Error {
    #[must_use]
    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
