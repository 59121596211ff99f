//! Bounded argument list for tasks started from a plain function pointer

use crate::constants::MAX_TASK_ARGS;

/// Up to `MAX_TASK_ARGS` machine words handed to a `fn` entry.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaskArgs {
    words: [usize; MAX_TASK_ARGS],
    len: usize,
}

impl TaskArgs {
    pub const fn new() -> Self {
        Self { words: [0; MAX_TASK_ARGS], len: 0 }
    }

    /// Append one word.
    ///
    /// # Panics
    ///
    /// Past `MAX_TASK_ARGS` words.
    pub fn push(&mut self, word: usize) -> &mut Self {
        assert!(
            self.len < MAX_TASK_ARGS,
            "task argument list is limited to {} words",
            MAX_TASK_ARGS
        );
        self.words[self.len] = word;
        self.len += 1;
        self
    }

    pub fn with(mut self, word: usize) -> Self {
        self.push(word);
        self
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<usize> {
        self.as_slice().get(i).copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.words[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for TaskArgs {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TaskArgs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl From<&[usize]> for TaskArgs {
    fn from(words: &[usize]) -> Self {
        let mut args = TaskArgs::new();
        for &w in words {
            args.push(w);
        }
        args
    }
}
