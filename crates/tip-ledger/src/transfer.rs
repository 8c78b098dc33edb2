use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::types::{Amount, Principal};

/// Value-transfer primitives supplied by the execution environment.
///
/// Each call is all-or-nothing: on `Err` no balance anywhere has changed.
pub trait ValueTransfer {
    /// Move `amount` from `from` into the ledger's custody.
    fn collect(&mut self, from: &Principal, amount: Amount) -> Result<(), TransferError>;

    /// Move `amount` out of the ledger's custody to `to`.
    fn pay_out(&mut self, to: &Principal, amount: Amount) -> Result<(), TransferError>;
}

/// In-memory external balances, with one custodial account standing in for
/// the ledger's own address.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountBook {
    custody: Principal,
    balances: BTreeMap<Principal, Amount>,
    #[serde(default)]
    rejecting: BTreeSet<Principal>,
}

impl AccountBook {
    pub fn new(custody: Principal) -> Self {
        Self {
            custody,
            balances: BTreeMap::new(),
            rejecting: BTreeSet::new(),
        }
    }

    /// Address of the account that holds collected value.
    pub fn custody(&self) -> &Principal {
        &self.custody
    }

    pub fn balance_of(&self, account: &Principal) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, account: &Principal, amount: Amount) -> Result<(), TransferError> {
        let balance = self.balances.entry(account.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow {
                account: account.clone(),
            })?;
        Ok(())
    }

    pub fn debit(&mut self, account: &Principal, amount: Amount) -> Result<(), TransferError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                account: account.clone(),
                needed: amount,
                available,
            });
        }
        if amount > 0 {
            self.balances.insert(account.clone(), available - amount);
        }
        Ok(())
    }

    /// Move value between two distinct accounts. Every check runs before
    /// either balance is touched.
    pub fn transfer(
        &mut self,
        from: &Principal,
        to: &Principal,
        amount: Amount,
    ) -> Result<(), TransferError> {
        if from == to {
            return Err(TransferError::SelfTransfer {
                account: from.clone(),
            });
        }
        if self.rejecting.contains(to) {
            return Err(TransferError::RecipientRejected {
                account: to.clone(),
            });
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                account: from.clone(),
                needed: amount,
                available,
            });
        }
        if self.balance_of(to).checked_add(amount).is_none() {
            return Err(TransferError::Overflow {
                account: to.clone(),
            });
        }
        self.debit(from, amount)?;
        self.credit(to, amount)?;
        debug!("transferred {amount} wei from {from} to {to}");
        Ok(())
    }

    /// Make `account` refuse incoming value, like a recipient contract that
    /// reverts on receive.
    pub fn reject_incoming(&mut self, account: Principal) {
        self.rejecting.insert(account);
    }

    pub fn accept_incoming(&mut self, account: &Principal) {
        self.rejecting.remove(account);
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Principal, Amount)> {
        self.balances.iter().map(|(p, b)| (p, *b))
    }

    /// Sum of every balance, custody included.
    pub fn total_supply(&self) -> Amount {
        self.balances
            .values()
            .fold(0, |acc: Amount, b| acc.saturating_add(*b))
    }
}

impl ValueTransfer for AccountBook {
    fn collect(&mut self, from: &Principal, amount: Amount) -> Result<(), TransferError> {
        let custody = self.custody.clone();
        self.transfer(from, &custody, amount)
    }

    fn pay_out(&mut self, to: &Principal, amount: Amount) -> Result<(), TransferError> {
        let custody = self.custody.clone();
        self.transfer(&custody, to, amount)
    }
}
