//! The rendering surface the session client draws on.

use crate::history::Side;

/// One selectable entry in the saved-threads pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadEntry {
    pub thread_id: String,
    pub label: String,
}

impl ThreadEntry {
    /// Entry produced by a full thread listing, numbered from 1.
    pub fn listed(position: usize, thread_id: &str) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            label: format!("{}. Thread {}", position, thread_id),
        }
    }

    /// Entry registered after a reply adopted a new thread.
    pub fn adopted(thread_id: &str) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            label: format!("Thread {}", thread_id),
        }
    }
}

/// What the saved-threads pane should show. Each call replaces the pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadsView<'a> {
    Entries(&'a [ThreadEntry]),
    Empty,
    LoadError,
}

pub const NO_THREADS_PLACEHOLDER: &str = "No threads available";
pub const THREADS_ERROR_PLACEHOLDER: &str = "Error loading threads";
pub const SEND_FAILED_NOTICE: &str = "Error sending message. Please try again.";

pub fn token_label(tokens: Option<u64>) -> String {
    match tokens {
        Some(n) => format!("Tokens used: {}", n),
        None => "Tokens used: unknown".to_string(),
    }
}

/// Display contract consumed by `SessionClient`.
///
/// Implementations must keep the view scrolled to the newest block after
/// every `append_block`.
pub trait Surface {
    fn append_block(&mut self, side: Side, text: &str);

    fn clear_blocks(&mut self);

    fn set_token_usage(&mut self, label: &str);

    fn clear_input(&mut self);

    /// Blocking, alert-style notice.
    fn notify(&mut self, message: &str);

    fn show_threads(&mut self, view: ThreadsView<'_>);
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ThreadsPane {
    #[default]
    NotLoaded,
    Entries(Vec<ThreadEntry>),
    Placeholder(&'static str),
}

/// Headless surface that records what would be on screen.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    pub blocks: Vec<(Side, String)>,
    pub token_label: String,
    pub threads: ThreadsPane,
    pub notifications: Vec<String>,
    pub input_clears: usize,
    /// Index of the block the view is pinned to.
    pub scrolled_to: Option<usize>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.blocks.iter().map(|(_, text)| text.as_str()).collect()
    }

    pub fn thread_ids(&self) -> Vec<&str> {
        match &self.threads {
            ThreadsPane::Entries(entries) => {
                entries.iter().map(|e| e.thread_id.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl Surface for MemorySurface {
    fn append_block(&mut self, side: Side, text: &str) {
        self.blocks.push((side, text.to_string()));
        self.scrolled_to = Some(self.blocks.len() - 1);
    }

    fn clear_blocks(&mut self) {
        self.blocks.clear();
        self.scrolled_to = None;
    }

    fn set_token_usage(&mut self, label: &str) {
        self.token_label = label.to_string();
    }

    fn clear_input(&mut self) {
        self.input_clears += 1;
    }

    fn notify(&mut self, message: &str) {
        self.notifications.push(message.to_string());
    }

    fn show_threads(&mut self, view: ThreadsView<'_>) {
        self.threads = match view {
            ThreadsView::Entries(entries) => ThreadsPane::Entries(entries.to_vec()),
            ThreadsView::Empty => ThreadsPane::Placeholder(NO_THREADS_PLACEHOLDER),
            ThreadsView::LoadError => ThreadsPane::Placeholder(THREADS_ERROR_PLACEHOLDER),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_labels() {
        assert_eq!(ThreadEntry::listed(2, "abc").label, "2. Thread abc");
        assert_eq!(ThreadEntry::adopted("abc").label, "Thread abc");
    }

    #[test]
    fn memory_surface_stays_pinned_to_newest_block() {
        let mut surface = MemorySurface::new();
        surface.append_block(Side::Right, "one");
        surface.append_block(Side::Left, "two");
        assert_eq!(surface.scrolled_to, Some(1));

        surface.clear_blocks();
        assert_eq!(surface.scrolled_to, None);
        assert!(surface.blocks.is_empty());
    }

    #[test]
    fn token_labels() {
        assert_eq!(token_label(Some(0)), "Tokens used: 0");
        assert_eq!(token_label(None), "Tokens used: unknown");
    }
}
