// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{block_log, fork_db};
use crate::crypto;
use crate::db;
use crate::encoding;
use crate::operations::ValidationError;
use crate::transaction::{SigneeError, TransactionId};
use thiserror::Error;

/// Failure taxonomy of the chain controller. A transaction failing with
/// any of these rolls back its own session; a block failing rolls back the
/// whole block.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed operation payload.
    #[error("validation: {0}")]
    Validation(String),
    /// The transaction's signatures do not satisfy a required authority.
    #[error("missing authority: {0}")]
    AuthorityMissing(String),
    /// State does not admit the operation (balance, missing object, ...).
    #[error("precondition: {0}")]
    Precondition(String),
    /// Block- or transaction-level protocol rule broken.
    #[error("protocol: {0}")]
    Protocol(String),
    /// The node's view of consensus state is inconsistent.
    #[error("consensus: {0}")]
    Consensus(String),
    /// The account exhausted its stake-scaled bandwidth.
    #[error("bandwidth exceeded for account {0}")]
    BandwidthExceeded(String),
    /// Unrecoverable: invariant violation or storage corruption.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("transaction {id}: {source}")]
    Transaction {
        id: TransactionId,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Db(#[from] db::Error),
    #[error(transparent)]
    BlockLog(#[from] block_log::Error),
    #[error(transparent)]
    ForkDb(#[from] fork_db::Error),
    #[error(transparent)]
    Block(#[from] crate::blocks::Error),
    #[error(transparent)]
    Encoding(#[from] encoding::Error),
    #[error(transparent)]
    Crypto(#[from] crypto::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Error {
        Error::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Error {
        Error::Precondition(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Error {
        Error::Protocol(msg.into())
    }

    /// Attach the offending transaction id.
    pub fn for_transaction(self, id: TransactionId) -> Error {
        Error::Transaction {
            id,
            source: Box::new(self),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Error {
        Error::Validation(err.0)
    }
}

impl From<SigneeError> for Error {
    fn from(err: SigneeError) -> Error {
        match err {
            SigneeError::Encoding(e) => Error::Encoding(e),
            SigneeError::Recovery(e) => Error::Crypto(e),
            SigneeError::Duplicate(key) => {
                Error::Protocol(format!("duplicate signature by {key}"))
            }
        }
    }
}

/// Evaluator-side `ensure`-style guard raising a typed chain error.
macro_rules! require {
    ($cond:expr, $variant:ident, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::chain::Error::$variant(format!($($arg)*)));
        }
    };
}
pub(crate) use require;
