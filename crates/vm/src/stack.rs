use crate::error::{VmError, VmResult};
use serde::Serialize;

/// Entries held by one stack page.
pub const STACK_PAGE_ENTRIES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StackKind {
    /// `PSH` / `POP` values
    User,
    /// `JSR` / `RET` return addresses
    Code,
}

/// Bounded LIFO stack sized in pages.
#[derive(Debug, Clone, Serialize)]
pub struct Stack<T> {
    kind: StackKind,
    data: Vec<T>,
    limit: usize,
}

impl<T: Copy> Stack<T> {
    pub fn new(kind: StackKind, pages: usize) -> Self {
        Self {
            kind,
            data: Vec::new(),
            limit: pages.saturating_mul(STACK_PAGE_ENTRIES),
        }
    }

    pub fn push(&mut self, value: T) -> VmResult<()> {
        if self.data.len() >= self.limit {
            return Err(match self.kind {
                StackKind::User => VmError::UserStackOverflow,
                StackKind::Code => VmError::CodeStackOverflow,
            });
        }
        self.data.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> VmResult<T> {
        self.data.pop().ok_or(match self.kind {
            StackKind::User => VmError::UserStackUnderflow,
            StackKind::Code => VmError::CodeStackUnderflow,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn kind(&self) -> StackKind {
        self.kind
    }

    /// Bottom to top.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}
