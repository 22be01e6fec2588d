//! Dialog engine: pure transition function.
//!
//! `step` looks at the current session (if any) and one inbound event and
//! decides what happens next. It never touches storage: when the answer
//! depends on the registration store it returns a `Step` asking the caller
//! to run the store call and feed the result to `after_lookup` or
//! `after_register`.

use tracing::{debug, warn};

use super::event::{EventKind, InboundEvent, ReplyDirective};
use super::state::{Session, Stage};
use super::validate;

/// What should happen to the stored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    /// Leave it exactly as it was (including absent).
    Keep,
    /// Replace it.
    Set(Session),
}

/// Outcome of feeding one event to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Reply right away.
    Reply {
        change: SessionChange,
        directive: ReplyDirective,
    },
    /// No dialog is running and the event is not a start command. Ask the
    /// store whether this user already registered, then call `after_lookup`.
    LookupRegistration,
    /// The dialog is complete. Insert the record if absent, remove the
    /// session, then call `after_register`.
    Register { name: String, phone: String },
}

impl Step {
    fn reply(change: SessionChange, directive: ReplyDirective) -> Self {
        Self::Reply { change, directive }
    }

    fn reprompt(stage: Stage) -> Self {
        Self::reply(SessionChange::Keep, prompt_for(stage))
    }
}

/// The prompt that asks for whatever `stage` is waiting on.
pub fn prompt_for(stage: Stage) -> ReplyDirective {
    match stage {
        Stage::AwaitingName => ReplyDirective::ShowNamePrompt,
        Stage::AwaitingPhone => ReplyDirective::ShowPhonePromptWithContactButton,
    }
}

/// Compute the next step for `event` given the current `session`.
pub fn step(session: Option<&Session>, event: &InboundEvent) -> Step {
    let Some(session) = session else {
        return match event.kind {
            EventKind::Start => {
                Step::reply(SessionChange::Set(Session::new()), ReplyDirective::ShowNamePrompt)
            }
            EventKind::Text | EventKind::Contact => Step::LookupRegistration,
        };
    };

    if !session.is_consistent() {
        warn!(
            stage = %session.stage,
            has_name = session.collected.name.is_some(),
            has_phone = session.collected.phone.is_some(),
            "Discarding corrupt session and restarting dialog"
        );
        return Step::reply(SessionChange::Set(Session::new()), ReplyDirective::ShowNamePrompt);
    }

    match (session.stage, event.kind) {
        // Restarting mid-dialog would move the stage backwards.
        (stage, EventKind::Start) => Step::reprompt(stage),

        (Stage::AwaitingName, EventKind::Text) => match validate::name(event.payload()) {
            Some(name) => {
                let mut next = session.clone();
                match next.record_name(name) {
                    Ok(stage) => Step::reply(SessionChange::Set(next), prompt_for(stage)),
                    Err(e) => {
                        warn!("Failed to advance dialog: {}", e);
                        Step::reprompt(session.stage)
                    }
                }
            }
            None => {
                debug!("Name missing or unusable, prompting again");
                Step::reprompt(Stage::AwaitingName)
            }
        },

        // A contact card carries no name.
        (Stage::AwaitingName, EventKind::Contact) => Step::reprompt(Stage::AwaitingName),

        (Stage::AwaitingPhone, EventKind::Text | EventKind::Contact) => {
            let Some(phone) = validate::phone(event.payload()) else {
                debug!(kind = ?event.kind, "Phone missing or unusable, prompting again");
                return Step::reprompt(Stage::AwaitingPhone);
            };
            match session.collected.name.clone() {
                Some(name) => Step::Register { name, phone },
                // Unreachable for consistent sessions.
                None => Step::reply(SessionChange::Set(Session::new()), ReplyDirective::ShowNamePrompt),
            }
        }
    }
}

/// Reply for a non-start event from a user with no dialog in progress.
pub fn after_lookup(already_registered: bool) -> ReplyDirective {
    if already_registered {
        ReplyDirective::ShowAlreadyHandledThenClose
    } else {
        ReplyDirective::ShowRestartPrompt
    }
}

/// Reply once the registration insert has run. Only the insert that
/// actually created the record gets a confirmation.
pub fn after_register(inserted: bool) -> ReplyDirective {
    if inserted {
        ReplyDirective::ShowConfirmationThenClose
    } else {
        ReplyDirective::ShowAlreadyHandledThenClose
    }
}
