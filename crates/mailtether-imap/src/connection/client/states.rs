//! Connection state markers.

/// Greeting received, not yet logged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Logged in, no mailbox selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// A mailbox is selected.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: String,
    pub(crate) read_only: bool,
    pub(crate) exists: u32,
}

impl Selected {
    /// Name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// True when opened with EXAMINE.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Message count last reported by the server.
    #[must_use]
    pub const fn exists(&self) -> u32 {
        self.exists
    }
}
