//! Internal loop slot
//!
//! Only one internal loop (over templates, delayed functions, parameters or scoped
//! vars) may be open at a time. Items are snapshots, so the loop body may change
//! the underlying lists without invalidating the cursor.

use tracing::debug;

use super::delayed::DelayedFunction;
use super::errors::{Result, ScriptError};
use super::types::{Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Templates,
    DelayedFunctions,
    Params,
    ScopedVars,
}

impl LoopKind {
    fn describe(self) -> &'static str {
        match self {
            LoopKind::Templates => "function template",
            LoopKind::DelayedFunctions => "delayed function",
            LoopKind::Params => "param",
            LoopKind::ScopedVars => "scoped var",
        }
    }
}

/// Current item of an open loop
#[derive(Debug, Clone, PartialEq)]
pub enum LoopItem {
    Template {
        name: String,
    },
    Delayed(DelayedFunction),
    Param {
        name: String,
        declared_type: ValueType,
        value: Value,
    },
    ScopedVar {
        name: String,
        declared_type: ValueType,
        value: Value,
    },
}

#[derive(Debug, Clone)]
pub struct LoopCursor {
    pub name: String,
    pub kind: LoopKind,
    pub index: i64,
    pub item: Option<LoopItem>,
}

#[derive(Debug, Default, Clone)]
pub struct LoopSlot {
    open: Option<LoopCursor>,
}

impl LoopSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a loop, failing if one is already open.
    pub fn try_acquire(&mut self, op: &'static str, name: &str, kind: LoopKind) -> Result<()> {
        if name.is_empty() {
            return Err(ScriptError::EmptyLoopName { op });
        }
        if let Some(open) = &self.open {
            return Err(ScriptError::LoopAlreadyOpen {
                open: open.name.clone(),
                requested: name.to_string(),
            });
        }
        debug!(loop_name = name, kind = ?kind, "opened internal loop");
        self.open = Some(LoopCursor {
            name: name.to_string(),
            kind,
            index: 0,
            item: None,
        });
        Ok(())
    }

    /// Point the open loop at its next item.
    pub fn advance(&mut self, index: usize, item: LoopItem) {
        if let Some(cursor) = self.open.as_mut() {
            cursor.index = index as i64;
            cursor.item = Some(item);
        }
    }

    pub fn release(&mut self) {
        if let Some(cursor) = self.open.take() {
            debug!(loop_name = %cursor.name, "closed internal loop");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn current(&self) -> Option<&LoopCursor> {
        self.open.as_ref()
    }

    /// Index of the current item, -1 when no loop is open.
    pub fn index(&self) -> i64 {
        self.open.as_ref().map_or(-1, |c| c.index)
    }

    pub fn require(&self, op: &'static str) -> Result<&LoopCursor> {
        self.open.as_ref().ok_or(ScriptError::NoLoopOpen { op })
    }

    /// Current item, checked against the kinds the caller can read.
    pub fn require_item(&self, op: &'static str, kinds: &[LoopKind]) -> Result<&LoopItem> {
        let cursor = self.require(op)?;
        match (&cursor.item, kinds.contains(&cursor.kind)) {
            (Some(item), true) => Ok(item),
            _ => Err(ScriptError::WrongLoopKind {
                op,
                loop_name: cursor.name.clone(),
                expected: kinds.first().map_or("matching", |k| k.describe()),
            }),
        }
    }
}
