use crate::domain::user::{User, normalize_email};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The whole persisted store: every user record in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(default)]
    pub users: Vec<User>,
}

impl UserDocument {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }

    /// Drops every record whose normalized email was already seen, keeping the
    /// first occurrence. Returns the number of records removed.
    ///
    /// Idempotent: a document without duplicates is left untouched.
    pub fn dedupe(&mut self) -> usize {
        let before = self.users.len();
        let mut seen = HashSet::with_capacity(before);
        self.users.retain(|u| seen.insert(normalize_email(&u.email)));
        before - self.users.len()
    }

    /// One more than the highest id in use, or 1 for an empty document.
    /// `None` once the highest id is `u64::MAX`.
    pub fn next_id(&self) -> Option<u64> {
        match self.users.iter().map(|u| u.id).max() {
            Some(max) => max.checked_add(1),
            None => Some(1),
        }
    }

    pub fn position_by_id(&self, id: u64) -> Option<usize> {
        self.users.iter().position(|u| u.id == id)
    }

    pub fn find_by_email(&self, normalized: &str) -> Option<&User> {
        self.users.iter().find(|u| u.has_email(normalized))
    }
}
