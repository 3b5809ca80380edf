//! Sequence with a persistent cursor.
//!
//! The cursor lives in `0..=len`. Unchecked accessors ([`PointerList::get`],
//! [`PointerList::peek_next`], ...) index directly and panic when the
//! corresponding validity check (`is_pointer_valid`, `is_next_valid`,
//! `is_last_valid`) is false; callers in hot loops check first. Every
//! accessor also comes as a `try_*` variant returning `Option`/`bool` and an
//! `*_or` variant falling back to a caller supplied default.
//!
//! Movement never reorders the underlying sequence.

/// Ordered list plus a single cursor index.
#[derive(Debug, Clone)]
pub struct PointerList<T> {
    items: Vec<T>,
    pointer: usize,
}

impl<T> Default for PointerList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pointer: 0,
        }
    }
}

impl<T> From<Vec<T>> for PointerList<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items, pointer: 0 }
    }
}

impl<T: Copy> PointerList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self::from(items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Moves the cursor to `index`, clamped to `0..=len`.
    pub fn set_pointer(&mut self, index: usize) {
        self.pointer = index.min(self.items.len());
    }

    pub fn set_pointer_to_first(&mut self, offset: usize) {
        self.set_pointer(offset);
    }

    /// Places the cursor `offset` elements before the last one.
    pub fn set_pointer_to_last(&mut self, offset: usize) {
        self.set_pointer(self.items.len().saturating_sub(1 + offset));
    }

    /// Elements strictly after the cursor.
    pub fn remaining_forward(&self) -> usize {
        self.items.len().saturating_sub(self.pointer + 1)
    }

    /// Elements strictly before the cursor.
    pub fn remaining_backward(&self) -> usize {
        self.pointer
    }

    pub fn is_pointer_valid(&self) -> bool {
        self.pointer < self.items.len()
    }

    pub fn is_next_valid(&self) -> bool {
        self.pointer + 1 < self.items.len()
    }

    pub fn is_last_valid(&self) -> bool {
        self.pointer >= 1 && self.pointer - 1 < self.items.len()
    }

    pub fn has_next(&self) -> bool {
        self.is_next_valid()
    }

    pub fn has_last(&self) -> bool {
        self.is_last_valid()
    }

    /// # Panics
    /// When `is_pointer_valid()` is false.
    pub fn get(&self) -> T {
        self.items[self.pointer]
    }

    /// # Panics
    /// When `is_next_valid()` is false.
    pub fn peek_next(&self) -> T {
        self.items[self.pointer + 1]
    }

    /// # Panics
    /// When `is_last_valid()` is false.
    pub fn peek_last(&self) -> T {
        self.items[self.pointer - 1]
    }

    /// # Panics
    /// When `is_next_valid()` is false.
    pub fn move_next(&mut self) -> T {
        let item = self.peek_next();
        self.pointer += 1;
        item
    }

    /// # Panics
    /// When `is_last_valid()` is false.
    pub fn move_last(&mut self) -> T {
        let item = self.peek_last();
        self.pointer -= 1;
        item
    }

    /// Advances the cursor by one. Stepping past the end is a no-op.
    pub fn skip_to_next(&mut self) {
        if self.pointer < self.items.len() {
            self.pointer += 1;
        }
    }

    /// Moves the cursor back by one. Stepping before the start is a no-op.
    pub fn skip_to_last(&mut self) {
        self.pointer = self.pointer.saturating_sub(1);
    }

    pub fn try_get(&self) -> Option<T> {
        self.is_pointer_valid().then(|| self.get())
    }

    pub fn try_peek_next(&self) -> Option<T> {
        self.is_next_valid().then(|| self.peek_next())
    }

    pub fn try_peek_last(&self) -> Option<T> {
        self.is_last_valid().then(|| self.peek_last())
    }

    pub fn try_move_next(&mut self) -> Option<T> {
        self.is_next_valid().then(|| self.move_next())
    }

    pub fn try_move_last(&mut self) -> Option<T> {
        self.is_last_valid().then(|| self.move_last())
    }

    pub fn try_skip_to_next(&mut self) -> bool {
        let valid = self.is_next_valid();
        if valid {
            self.pointer += 1;
        }
        valid
    }

    pub fn try_skip_to_last(&mut self) -> bool {
        let valid = self.is_last_valid();
        if valid {
            self.pointer -= 1;
        }
        valid
    }

    pub fn get_or(&self, default: T) -> T {
        self.try_get().unwrap_or(default)
    }

    pub fn peek_next_or(&self, default: T) -> T {
        self.try_peek_next().unwrap_or(default)
    }

    pub fn peek_last_or(&self, default: T) -> T {
        self.try_peek_last().unwrap_or(default)
    }

    pub fn move_next_or(&mut self, default: T) -> T {
        self.try_move_next().unwrap_or(default)
    }

    pub fn move_last_or(&mut self, default: T) -> T {
        self.try_move_last().unwrap_or(default)
    }

    /// Places the cursor on the first element for which `crossed` is false.
    ///
    /// `crossed` must be true for a prefix of the list and false afterwards,
    /// which holds for any predicate monotonic in the list's sort key.
    pub fn seek_partition<F>(&mut self, crossed: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.pointer = self.items.partition_point(crossed);
    }

    /// Stable re-sort of the underlying items. The cursor index is kept as-is
    /// and usually needs re-seating with [`PointerList::seek_partition`].
    pub fn sort_by_key_f64<F>(&mut self, mut key: F)
    where
        F: FnMut(&T) -> f64,
    {
        self.items.sort_by(|a, b| key(a).total_cmp(&key(b)));
    }
}
