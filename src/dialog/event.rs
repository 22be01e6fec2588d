//! Inbound events and outbound reply directives.

use serde::{Deserialize, Serialize};

/// What kind of message arrived from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The start command (`/start`).
    Start,
    /// A plain text message.
    Text,
    /// A shared contact card.
    Contact,
}

/// One inbound event for a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub kind: EventKind,
    /// Raw text, or the contact's phone number. `None` when the transport
    /// delivered the event without usable data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl InboundEvent {
    pub fn new(kind: EventKind, payload: Option<String>) -> Self {
        Self { kind, payload }
    }

    pub fn start() -> Self {
        Self::new(EventKind::Start, None)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(EventKind::Text, Some(text.into()))
    }

    pub fn contact(phone: impl Into<String>) -> Self {
        Self::new(EventKind::Contact, Some(phone.into()))
    }

    /// Payload as `&str`, if any.
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }
}

/// What the outbound notifier should show the user.
///
/// The dialog never sends anything itself; it only returns one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyDirective {
    ShowNamePrompt,
    ShowPhonePromptWithContactButton,
    /// The registration was just recorded: confirm, then close.
    ShowConfirmationThenClose,
    /// The user was already registered: close without confirming again.
    ShowAlreadyHandledThenClose,
    ShowRestartPrompt,
}

impl ReplyDirective {
    /// Whether this directive ends the dialog.
    pub fn closes_dialog(&self) -> bool {
        matches!(
            self,
            Self::ShowConfirmationThenClose | Self::ShowAlreadyHandledThenClose
        )
    }
}

impl std::fmt::Display for ReplyDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ShowNamePrompt => "show_name_prompt",
            Self::ShowPhonePromptWithContactButton => "show_phone_prompt_with_contact_button",
            Self::ShowConfirmationThenClose => "show_confirmation_then_close",
            Self::ShowAlreadyHandledThenClose => "show_already_handled_then_close",
            Self::ShowRestartPrompt => "show_restart_prompt",
        };
        write!(f, "{s}")
    }
}
