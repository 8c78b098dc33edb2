//! Core of the Buy Me A Drink tip jar.
//!
//! A [`TipLedger`] holds value in custody on behalf of a single owner. Anyone
//! can tip it through [`TipLedger::buy_drink`], leaving a permanent [`Note`];
//! only the owner fixed at construction can drain it with
//! [`TipLedger::withdraw_funds`].
//!
//! The ledger does no I/O of its own. Caller identity, attached value and
//! time arrive in a [`CallContext`], and value moves through whatever
//! [`ValueTransfer`] implementation the environment provides:
//!
//! * [`ledger`] — the state machine, its events and snapshots.
//! * [`note`] — notes and the append-only note log.
//! * [`transfer`] — the value-transfer seam and an in-memory [`AccountBook`].
//! * [`units`] — wei/ether conversion helpers.

pub mod ledger;
pub mod note;
pub mod transfer;
pub mod types;
pub mod units;

mod error;

pub use error::{EmptyPrincipal, LedgerError, TransferError, UnitsError};
pub use ledger::{LedgerEvent, LedgerSnapshot, TipLedger};
pub use note::{Note, NoteLog};
pub use transfer::{AccountBook, ValueTransfer};
pub use types::{Amount, CallContext, Principal, Timestamp};
pub use units::{format_ether, parse_ether, WEI_PER_ETHER};
