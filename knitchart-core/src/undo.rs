use std::collections::VecDeque;

pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Linear, bounded undo history for a single piece of state.
///
/// Every push stores an owned copy of the previous value, so later edits to
/// `current` never reach back into history. Once `max_depth` entries are
/// held, the oldest one is dropped for good.
#[derive(Debug, Clone)]
pub struct UndoStack<T> {
    current: T,
    history: VecDeque<T>,
    max_depth: usize,
}

impl<T: Clone + PartialEq> UndoStack<T> {
    pub fn new(initial: T) -> Self {
        Self::with_max_depth(initial, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(initial: T, max_depth: usize) -> Self {
        Self {
            current: initial,
            history: VecDeque::new(),
            max_depth,
        }
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn push(&mut self, new_state: T) {
        let previous = std::mem::replace(&mut self.current, new_state);
        self.history.push_back(previous);
        while self.history.len() > self.max_depth {
            self.history.pop_front();
        }
    }

    /// Returns `false` when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop_back() {
            Some(previous) => {
                self.current = previous;
                true
            }
            None => false,
        }
    }

    /// Replaces the current value and forgets all history. Not undoable.
    pub fn reset(&mut self, state: T) {
        self.current = state;
        self.history.clear();
    }
}
