use std::slice;

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Principal, Timestamp};

/// Permanent record of one accepted tip.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    sender: Principal,
    display_name: String,
    message: String,
    amount: Amount,
    timestamp: Timestamp,
}

impl Note {
    pub(crate) fn new(
        sender: Principal,
        display_name: String,
        message: String,
        amount: Amount,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            sender,
            display_name,
            message,
            amount,
            timestamp,
        }
    }

    pub fn sender(&self) -> &Principal {
        &self.sender
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Value that came with the tip, in wei.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Append-only, insertion-ordered log of notes.
///
/// There is no way to remove, reorder or edit an entry, and only the ledger
/// can append.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct NoteLog {
    notes: Vec<Note>,
}

impl NoteLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, note: Note) {
        self.notes.push(note);
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Note> {
        self.notes.get(index)
    }

    pub fn last(&self) -> Option<&Note> {
        self.notes.last()
    }

    pub fn iter(&self) -> slice::Iter<'_, Note> {
        self.notes.iter()
    }

    pub fn as_slice(&self) -> &[Note] {
        &self.notes
    }

    /// Sum of the amounts carried by every note. `None` on overflow.
    pub fn total_amount(&self) -> Option<Amount> {
        self.notes
            .iter()
            .try_fold(0 as Amount, |acc, note| acc.checked_add(note.amount))
    }
}

impl<'a> IntoIterator for &'a NoteLog {
    type Item = &'a Note;
    type IntoIter = slice::Iter<'a, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
