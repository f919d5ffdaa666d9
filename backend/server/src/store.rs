//! # Pairing State
//!
//! Two in-memory maps keyed by normalized phone number.
//!
//! ## Pairings
//! - phone -> code, expiry, wrong-guess counter
//! - Last request wins, a new code replaces the old one and resets the counter
//! - Removed on successful verification, on expiry, or once guesses run out
//!
//! ## Sessions
//! - phone -> session expiry
//! - Created by a successful verification
//! - Claimed (removed) by exactly one update attempt, whatever its outcome
//! - A claim also drops any pending code for the phone, nothing is cleaned up
//!   after the update finishes so a newer cycle started meanwhile survives
//!
//! Every check-then-act runs as one map operation so concurrent verifies or
//! updates for the same phone cannot interleave. Nothing survives a restart.
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairingEntry {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl PairingEntry {
    pub fn new(code: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            code,
            expires_at,
            attempts: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    Accepted,
    NoPairing,
    Expired,
    WrongCode { attempts: u32 },
    Exhausted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Purged {
    pub pairings: usize,
    pub sessions: usize,
}

/// Shared pairing/session state.
///
/// Async so a networked store can stand in for [`MemoryStore`] when the
/// service runs as more than one instance.
#[async_trait]
pub trait PairingStore: Send + Sync {
    /// Stores a pending code, replacing any earlier one for the phone.
    async fn put_pairing(&self, phone: &str, entry: PairingEntry);

    async fn pairing(&self, phone: &str) -> Option<PairingEntry>;

    /// Checks `code` against the pending entry and, on a match, consumes the
    /// entry and opens a session.
    async fn verify(&self, phone: &str, code: &str, now: DateTime<Utc>) -> Verification;

    async fn is_active(&self, phone: &str, now: DateTime<Utc>) -> bool;

    /// Removes the session together with any pending code and reports
    /// whether the session was still valid.
    async fn claim(&self, phone: &str, now: DateTime<Utc>) -> bool;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Purged;
}

pub struct MemoryStore {
    pairings: DashMap<String, PairingEntry>,
    sessions: DashMap<String, DateTime<Utc>>,
    max_attempts: u32,
    session_ttl: TimeDelta,
}

impl MemoryStore {
    /// `max_attempts` of zero disables the wrong-guess cap.
    pub fn new(max_attempts: u32, session_ttl: Duration) -> Self {
        Self {
            pairings: DashMap::new(),
            sessions: DashMap::new(),
            max_attempts,
            session_ttl: TimeDelta::from_std(session_ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    fn session_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.session_ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[async_trait]
impl PairingStore for MemoryStore {
    async fn put_pairing(&self, phone: &str, entry: PairingEntry) {
        self.pairings.insert(phone.to_string(), entry);
    }

    async fn pairing(&self, phone: &str) -> Option<PairingEntry> {
        self.pairings.get(phone).map(|entry| entry.clone())
    }

    async fn verify(&self, phone: &str, code: &str, now: DateTime<Utc>) -> Verification {
        let Entry::Occupied(mut entry) = self.pairings.entry(phone.to_string()) else {
            return Verification::NoPairing;
        };

        if entry.get().expires_at <= now {
            entry.remove();
            return Verification::Expired;
        }

        if entry.get().code != code {
            let attempts = {
                let pairing = entry.get_mut();
                pairing.attempts += 1;
                pairing.attempts
            };

            if self.max_attempts > 0 && attempts >= self.max_attempts {
                entry.remove();
                return Verification::Exhausted;
            }

            return Verification::WrongCode { attempts };
        }

        self.sessions
            .insert(phone.to_string(), self.session_expiry(now));
        entry.remove();

        Verification::Accepted
    }

    async fn is_active(&self, phone: &str, now: DateTime<Utc>) -> bool {
        self.sessions
            .get(phone)
            .is_some_and(|expires_at| *expires_at > now)
    }

    async fn claim(&self, phone: &str, now: DateTime<Utc>) -> bool {
        let Some((_, expires_at)) = self.sessions.remove(phone) else {
            return false;
        };

        self.pairings.remove(phone);

        expires_at > now
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Purged {
        let mut purged = Purged::default();

        self.pairings.retain(|_, entry| {
            let keep = entry.expires_at > now;
            if !keep {
                purged.pairings += 1;
            }
            keep
        });

        self.sessions.retain(|_, expires_at| {
            let keep = *expires_at > now;
            if !keep {
                purged.sessions += 1;
            }
            keep
        });

        purged
    }
}
