use thiserror::Error;

/// Returned by cell writes attempted while a formula evaluation is on
/// the stack. The write is rejected before any state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cell written during a formula evaluation")]
pub struct WriteError;
