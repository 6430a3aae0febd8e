//! Vote ledger shared by questions and answers.
//!
//! Each voter holds at most one row per target in `votes`, so the upvote and
//! downvote sets are disjoint by construction. Net counts are always derived
//! from those rows and never stored.

use std::{collections::BTreeSet, str::FromStr};

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    fn value(self) -> i32 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

impl FromStr for VoteDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(VoteDirection::Up),
            "down" => Ok(VoteDirection::Down),
            other => Err(AppError::Validation(format!(
                "Vote must be 'up' or 'down', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Question,
    Answer,
}

impl VoteTarget {
    /// Value stored in `votes.target_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            VoteTarget::Question => "question",
            VoteTarget::Answer => "answer",
        }
    }

    fn table(self) -> &'static str {
        match self {
            VoteTarget::Question => "questions",
            VoteTarget::Answer => "answers",
        }
    }

    fn label(self) -> &'static str {
        match self {
            VoteTarget::Question => "Question",
            VoteTarget::Answer => "Answer",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteSets {
    pub upvotes: BTreeSet<i64>,
    pub downvotes: BTreeSet<i64>,
}

impl VoteSets {
    pub fn count(&self) -> i64 {
        self.upvotes.len() as i64 - self.downvotes.len() as i64
    }

    #[cfg(test)]
    pub fn direction_of(&self, voter_id: i64) -> Option<VoteDirection> {
        if self.upvotes.contains(&voter_id) {
            Some(VoteDirection::Up)
        } else if self.downvotes.contains(&voter_id) {
            Some(VoteDirection::Down)
        } else {
            None
        }
    }

    pub fn into_vecs(self) -> (Vec<i64>, Vec<i64>) {
        (
            self.upvotes.into_iter().collect(),
            self.downvotes.into_iter().collect(),
        )
    }
}

pub fn load_vote_sets(
    conn: &Connection,
    target: VoteTarget,
    target_id: i64,
) -> rusqlite::Result<VoteSets> {
    let mut stmt = conn.prepare(
        "SELECT user_id, value FROM votes WHERE target_type = ?1 AND target_id = ?2",
    )?;
    let rows = stmt.query_map(rusqlite::params![target.as_str(), target_id], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i32>(1)?))
    })?;

    let mut sets = VoteSets::default();
    for row in rows {
        let (user_id, value) = row?;
        if value > 0 {
            sets.upvotes.insert(user_id);
        } else {
            sets.downvotes.insert(user_id);
        }
    }
    Ok(sets)
}

/// Replace any previous vote by `voter_id` on the target with `direction`.
///
/// Runs in its own immediate transaction, so concurrent votes on the same
/// target serialize instead of overwriting each other.
pub fn apply_vote(
    conn: &mut Connection,
    target: VoteTarget,
    target_id: i64,
    voter_id: i64,
    direction: VoteDirection,
) -> AppResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let exists = tx
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", target.table()),
            [target_id],
            |_| Ok(()),
        )
        .optional()?;
    if exists.is_none() {
        return Err(AppError::not_found(target.label()));
    }

    tx.execute(
        "DELETE FROM votes WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3",
        rusqlite::params![voter_id, target.as_str(), target_id],
    )?;
    tx.execute(
        "INSERT INTO votes (user_id, target_type, target_id, value) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![voter_id, target.as_str(), target_id, direction.value()],
    )?;

    tx.commit()?;
    Ok(())
}

/// Drop every vote recorded against one target.
pub fn clear_votes(conn: &Connection, target: VoteTarget, target_id: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM votes WHERE target_type = ?1 AND target_id = ?2",
        rusqlite::params![target.as_str(), target_id],
    )
}
