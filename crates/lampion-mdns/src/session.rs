//! Lifecycle pieces common to both session kinds.

use lampion_core::{SessionId, SessionKind};

/// Lifecycle state of a session.
///
/// `Stopped` is terminal; a disposed session never runs again and its id is
/// free for reuse the moment disposal returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initialized, not yet started
    Created,

    /// The underlying network operation is active
    Running,

    /// Disposed
    Stopped,
}

/// Capabilities shared by broadcast and discovery sessions.
///
/// The registry uses this to tear every live session down uniformly without
/// caring which kind it holds.
pub trait Session: Send + Sync {
    /// The caller-assigned identifier.
    fn id(&self) -> SessionId;

    /// Which kind of session this is.
    fn kind(&self) -> SessionKind;

    /// Current lifecycle state.
    fn state(&self) -> SessionState;

    /// Cancels the underlying network operation. Idempotent.
    fn dispose(&self);
}
