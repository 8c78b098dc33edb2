use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;
use crate::note::{Note, NoteLog};
use crate::transfer::ValueTransfer;
use crate::types::{Amount, CallContext, Principal, Timestamp};

/// Externally tagged: internally tagged enums buffer through serde's
/// `Content`, which cannot hold the `u128` amounts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    DrinkBought {
        from: Principal,
        amount: Amount,
        timestamp: Timestamp,
    },
    FundsWithdrawn {
        to: Principal,
        amount: Amount,
    },
}

/// Owned, serializable copy of the ledger at one point in time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub owner: Principal,
    pub balance: Amount,
    pub total_received: Amount,
    pub total_withdrawn: Amount,
    pub notes: NoteLog,
    pub events: Vec<LedgerEvent>,
    #[serde(with = "crate::ledger::hex_root")]
    pub state_root: [u8; 32],
}

/// Custodial tip jar: collects tips with notes, pays everything out to a
/// single owner fixed at construction.
#[derive(Clone, Debug)]
pub struct TipLedger {
    owner: Principal,
    balance: Amount,
    total_received: Amount,
    total_withdrawn: Amount,
    notes: NoteLog,
    events: Vec<LedgerEvent>,
}

impl TipLedger {
    pub fn new(owner: Principal) -> Self {
        Self {
            owner,
            balance: 0,
            total_received: 0,
            total_withdrawn: 0,
            notes: NoteLog::new(),
            events: Vec::new(),
        }
    }

    pub fn owner(&self) -> &Principal {
        &self.owner
    }

    /// Value currently held in custody, in wei.
    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn notes(&self) -> &NoteLog {
        &self.notes
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn total_received(&self) -> Amount {
        self.total_received
    }

    pub fn total_withdrawn(&self) -> Amount {
        self.total_withdrawn
    }

    /// Accept a tip of `ctx.value` from `ctx.caller` and record a note.
    ///
    /// The value is collected through `bank` first; the note and balance are
    /// only written once that succeeds.
    pub fn buy_drink<B: ValueTransfer + ?Sized>(
        &mut self,
        ctx: &CallContext,
        display_name: impl Into<String>,
        message: impl Into<String>,
        bank: &mut B,
    ) -> Result<(), LedgerError> {
        if ctx.value == 0 {
            warn!("rejected zero-value drink from {}", ctx.caller);
            return Err(LedgerError::InsufficientPayment);
        }
        let balance = self
            .balance
            .checked_add(ctx.value)
            .ok_or(LedgerError::BalanceOverflow)?;
        let total_received = self
            .total_received
            .checked_add(ctx.value)
            .ok_or(LedgerError::BalanceOverflow)?;

        bank.collect(&ctx.caller, ctx.value)?;

        self.balance = balance;
        self.total_received = total_received;
        self.notes.append(Note::new(
            ctx.caller.clone(),
            display_name.into(),
            message.into(),
            ctx.value,
            ctx.timestamp,
        ));
        self.events.push(LedgerEvent::DrinkBought {
            from: ctx.caller.clone(),
            amount: ctx.value,
            timestamp: ctx.timestamp,
        });
        debug!(
            "drink bought by {} for {} wei (note #{})",
            ctx.caller,
            ctx.value,
            self.notes.len()
        );
        Ok(())
    }

    /// Pay the whole custodial balance to the owner and return the amount
    /// paid. An empty jar is a successful no-op returning zero.
    ///
    /// Value attached to `ctx` is ignored.
    pub fn withdraw_funds<B: ValueTransfer + ?Sized>(
        &mut self,
        ctx: &CallContext,
        bank: &mut B,
    ) -> Result<Amount, LedgerError> {
        if ctx.caller != self.owner {
            warn!("withdrawal attempt by non-owner {}", ctx.caller);
            return Err(LedgerError::NotAuthorized {
                caller: ctx.caller.clone(),
            });
        }
        let amount = self.balance;
        if amount == 0 {
            debug!("withdrawal with empty balance, nothing to do");
            return Ok(0);
        }

        bank.pay_out(&self.owner, amount)?;

        self.balance = 0;
        // cannot overflow: total_withdrawn + balance == total_received
        self.total_withdrawn += amount;
        self.events.push(LedgerEvent::FundsWithdrawn {
            to: self.owner.clone(),
            amount,
        });
        debug!("withdrew {amount} wei to {}", self.owner);
        Ok(amount)
    }

    /// Check the accounting identities that every reachable state satisfies.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        let expected = self.total_received.checked_sub(self.total_withdrawn);
        if expected != Some(self.balance) {
            return Err(LedgerError::CorruptSnapshot(format!(
                "balance {} does not equal received {} minus withdrawn {}",
                self.balance, self.total_received, self.total_withdrawn
            )));
        }
        if self.notes.total_amount() != Some(self.total_received) {
            return Err(LedgerError::CorruptSnapshot(
                "note amounts do not add up to total received".into(),
            ));
        }
        let bought = self
            .events
            .iter()
            .filter(|e| matches!(e, LedgerEvent::DrinkBought { .. }))
            .count();
        if bought != self.notes.len() {
            return Err(LedgerError::CorruptSnapshot(format!(
                "{} notes but {bought} drink events",
                self.notes.len()
            )));
        }
        let withdrawn = self
            .events
            .iter()
            .filter_map(|e| match e {
                LedgerEvent::FundsWithdrawn { amount, .. } => Some(*amount),
                LedgerEvent::DrinkBought { .. } => None,
            })
            .try_fold(0 as Amount, |acc, a| acc.checked_add(a));
        if withdrawn != Some(self.total_withdrawn) {
            return Err(LedgerError::CorruptSnapshot(
                "withdrawal events do not add up to total withdrawn".into(),
            ));
        }
        Ok(())
    }

    pub fn state_root(&self) -> [u8; 32] {
        compute_state_root(self)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            owner: self.owner.clone(),
            balance: self.balance,
            total_received: self.total_received,
            total_withdrawn: self.total_withdrawn,
            notes: self.notes.clone(),
            events: self.events.clone(),
            state_root: self.state_root(),
        }
    }

    /// Rebuild a ledger from a snapshot, refusing one whose invariants or
    /// state root do not hold.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        let ledger = Self {
            owner: snapshot.owner,
            balance: snapshot.balance,
            total_received: snapshot.total_received,
            total_withdrawn: snapshot.total_withdrawn,
            notes: snapshot.notes,
            events: snapshot.events,
        };
        ledger.check_invariants()?;
        if ledger.state_root() != snapshot.state_root {
            return Err(LedgerError::CorruptSnapshot("state root mismatch".into()));
        }
        Ok(ledger)
    }
}

fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn compute_state_root(ledger: &TipLedger) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(2 + ledger.notes.len());

    let mut hasher = Sha256::new();
    hasher.update(b"owner");
    hash_field(&mut hasher, ledger.owner.as_bytes());
    leaves.push(hasher.finalize().into());

    let mut hasher = Sha256::new();
    hasher.update(b"totals");
    hasher.update(ledger.balance.to_le_bytes());
    hasher.update(ledger.total_received.to_le_bytes());
    hasher.update(ledger.total_withdrawn.to_le_bytes());
    leaves.push(hasher.finalize().into());

    for note in &ledger.notes {
        let mut hasher = Sha256::new();
        hasher.update(b"note");
        hash_field(&mut hasher, note.sender().as_bytes());
        hash_field(&mut hasher, note.display_name().as_bytes());
        hash_field(&mut hasher, note.message().as_bytes());
        hasher.update(note.amount().to_le_bytes());
        hasher.update(note.timestamp().to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for event in &ledger.events {
        let mut hasher = Sha256::new();
        match event {
            LedgerEvent::DrinkBought {
                from,
                amount,
                timestamp,
            } => {
                hasher.update(b"bought");
                hash_field(&mut hasher, from.as_bytes());
                hasher.update(amount.to_le_bytes());
                hasher.update(timestamp.to_le_bytes());
            }
            LedgerEvent::FundsWithdrawn { to, amount } => {
                hasher.update(b"withdrawn");
                hash_field(&mut hasher, to.as_bytes());
                hasher.update(amount.to_le_bytes());
            }
        }
        leaves.push(hasher.finalize().into());
    }
    fold_root(leaves)
}

fn fold_root(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    // the owner and totals leaves are always present
    leaves[0]
}

pub(crate) mod hex_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("state root must be 32 bytes"))
    }
}
