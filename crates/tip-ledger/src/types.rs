use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::EmptyPrincipal;

/// Value in the smallest indivisible unit (wei).
pub type Amount = u128;

/// Logical time supplied by the environment. Stored verbatim, never assumed
/// to be monotonic.
pub type Timestamp = u64;

/// Opaque, authenticated caller identity (an account address).
///
/// Never empty: the only way to build one goes through [`Principal::new`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Result<Self, EmptyPrincipal> {
        let id = id.into();
        if id.is_empty() {
            return Err(EmptyPrincipal);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Principal {
    type Err = EmptyPrincipal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Principal {
    type Error = EmptyPrincipal;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Principal> for String {
    fn from(value: Principal) -> Self {
        value.0
    }
}

/// Who is calling, with how much value attached, and when.
///
/// The environment fills this in for every call; the ledger never looks
/// anywhere else for caller identity or payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Principal,
    pub value: Amount,
    pub timestamp: Timestamp,
}

impl CallContext {
    /// A call without attached value.
    pub fn new(caller: Principal, timestamp: Timestamp) -> Self {
        Self {
            caller,
            value: 0,
            timestamp,
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}
