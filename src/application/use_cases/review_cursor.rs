use serde::Serialize;

/// Result of moving the cursor forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CursorStep {
    Moved,
    /// The last item was passed; the list has been cleared.
    Exhausted,
}

/// One-at-a-time pointer over a fetched list during manual triage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCursor<T> {
    items: Vec<T>,
    index: usize,
}

impl<T> Default for ReviewCursor<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: 0,
        }
    }
}

impl<T> ReviewCursor<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, index: 0 }
    }

    pub fn current(&self) -> Option<&T> {
        self.items.get(self.index)
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        self.items.get_mut(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn advance(&mut self) -> CursorStep {
        if self.index + 1 < self.items.len() {
            self.index += 1;
            CursorStep::Moved
        } else {
            self.items.clear();
            self.index = 0;
            CursorStep::Exhausted
        }
    }

    /// Sends the current item to the back; the next one slides into place.
    /// Lists of one or zero items are left alone.
    pub fn skip(&mut self) -> bool {
        if self.items.len() <= 1 || self.index >= self.items.len() {
            return false;
        }
        let item = self.items.remove(self.index);
        self.items.push(item);
        true
    }

    /// Called once a disposition was recorded remotely. The remote result field
    /// is the permanent record, so locally the item is simply passed over.
    pub fn remove_current(&mut self) -> CursorStep {
        self.advance()
    }

    /// Ends the session without consuming the remaining items.
    pub fn clear(&mut self) {
        self.items.clear();
        self.index = 0;
    }
}
