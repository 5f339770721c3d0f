//! Small shared types.

/// Handle identifying a single callback registration on an observer registry.
///
/// Deregistration is keyed by this handle, not by callback equality, so
/// removing one subscription can never remove another by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Category of a local chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(dead_code)]
pub enum MessageCategory {
    #[default]
    Chat,
    Info,
    Error,
}
