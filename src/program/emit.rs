// src/program/emit.rs

//! Pending-emit bookkeeping.
//!
//! Emits are consumed through a cursor into an append-only list rather than
//! a live iterator, so the position can be persisted and an interrupted run
//! resumes exactly where it stopped.

use crate::types::{EmitKind, UnitPath};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEmit {
    pub unit: UnitPath,
    pub kind: EmitKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingEmitQueue {
    entries: Vec<PendingEmit>,
    cursor: usize,
}

impl PendingEmitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from persisted parts. An out-of-range cursor is clamped.
    pub fn from_parts(entries: Vec<PendingEmit>, cursor: usize) -> Self {
        let cursor = cursor.min(entries.len());
        Self { entries, cursor }
    }

    /// Request an emit for `unit`. A request for a unit that is already
    /// pending upgrades the existing entry instead of adding a second one.
    pub fn push(&mut self, unit: &str, kind: EmitKind) {
        if let Some(existing) = self.entries[self.cursor..]
            .iter_mut()
            .find(|e| e.unit == unit)
        {
            existing.kind = existing.kind.merge(kind);
            return;
        }
        self.entries.push(PendingEmit {
            unit: unit.to_string(),
            kind,
        });
    }

    /// Take the entry under the cursor and advance.
    pub fn next_pending(&mut self) -> Option<PendingEmit> {
        let entry = self.entries.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(entry)
    }

    /// Pending kind of `unit`, if it has not been emitted yet.
    pub fn kind_of(&self, unit: &str) -> Option<EmitKind> {
        self.remaining()
            .iter()
            .find(|e| e.unit == unit)
            .map(|e| e.kind)
    }

    pub fn remaining(&self) -> &[PendingEmit] {
        &self.entries[self.cursor..]
    }

    pub fn entries(&self) -> &[PendingEmit] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor >= self.entries.len()
    }

    /// Drop consumed entries and entries for units `keep` rejects.
    pub fn compact<F>(&mut self, keep: F)
    where
        F: Fn(&str) -> bool,
    {
        self.entries.drain(..self.cursor);
        self.cursor = 0;
        self.entries.retain(|e| keep(&e.unit));
    }
}
