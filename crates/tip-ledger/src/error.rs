use thiserror::Error;

use crate::types::{Amount, Principal};

/// Errors returned by [`TipLedger`](crate::TipLedger) operations.
///
/// A failed operation never leaves partial state behind: the ledger is
/// exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// `buy_drink` was called without any value attached.
    #[error("buying a drink requires a payment greater than zero")]
    InsufficientPayment,

    /// `withdraw_funds` was called by someone other than the owner.
    #[error("{caller} is not authorized to withdraw funds")]
    NotAuthorized { caller: Principal },

    /// The environment could not move the value. Surfaced unchanged.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Accepting the tip would overflow the custodial balance.
    #[error("custodial balance would overflow")]
    BalanceOverflow,

    /// A snapshot failed its invariant or state-root check on restore.
    #[error("corrupt ledger snapshot: {0}")]
    CorruptSnapshot(String),
}

/// Failures of the value-transfer primitives supplied by the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient funds in account {account}: needed {needed}, available {available}")]
    InsufficientFunds {
        account: Principal,
        needed: Amount,
        available: Amount,
    },
    #[error("account {account} does not accept incoming value")]
    RecipientRejected { account: Principal },
    #[error("account {account} cannot send value to itself")]
    SelfTransfer { account: Principal },
    #[error("balance of account {account} would overflow")]
    Overflow { account: Principal },
}

/// Failure to parse a decimal ether amount.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount {0:?}")]
    Invalid(String),
    #[error("too many fractional digits ({digits}, at most 18)")]
    TooPrecise { digits: usize },
    #[error("amount does not fit in 128 bits")]
    Overflow,
}

/// Raised when constructing a [`Principal`] from an empty identity.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("principal identity must not be empty")]
pub struct EmptyPrincipal;
