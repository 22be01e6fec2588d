//! Turn reply directives into concrete outgoing messages.

use crate::config::Prompts;
use crate::dialog::ReplyDirective;

use super::channel::{OutgoingReply, ReplyKeyboard};

/// Messages to send for `directive`, in delivery order.
pub fn render(directive: ReplyDirective, prompts: &Prompts) -> Vec<OutgoingReply> {
    let closing = || OutgoingReply::text(&prompts.closing).with_keyboard(ReplyKeyboard::Remove);

    match directive {
        ReplyDirective::ShowNamePrompt => vec![OutgoingReply::text(&prompts.name)],
        ReplyDirective::ShowPhonePromptWithContactButton => {
            vec![
                OutgoingReply::text(&prompts.phone).with_keyboard(ReplyKeyboard::RequestContact {
                    label: prompts.contact_button.clone(),
                }),
            ]
        }
        ReplyDirective::ShowConfirmationThenClose => {
            vec![OutgoingReply::text(&prompts.confirmation), closing()]
        }
        ReplyDirective::ShowAlreadyHandledThenClose => vec![closing()],
        ReplyDirective::ShowRestartPrompt => vec![OutgoingReply::text(&prompts.restart)],
    }
}

/// Message sent when an event could not be processed.
pub fn failure(prompts: &Prompts) -> OutgoingReply {
    OutgoingReply::text(&prompts.failure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_prompt_carries_contact_button() {
        let prompts = Prompts::default();
        let replies = render(ReplyDirective::ShowPhonePromptWithContactButton, &prompts);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, prompts.phone);
        assert_eq!(
            replies[0].keyboard,
            ReplyKeyboard::RequestContact {
                label: prompts.contact_button.clone()
            }
        );
    }

    #[test]
    fn confirmation_then_closing() {
        let prompts = Prompts::default();
        let replies = render(ReplyDirective::ShowConfirmationThenClose, &prompts);
        let texts: Vec<&str> = replies.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec![prompts.confirmation.as_str(), prompts.closing.as_str()]);
        assert_eq!(replies[0].keyboard, ReplyKeyboard::Unchanged);
        assert_eq!(replies[1].keyboard, ReplyKeyboard::Remove);
    }

    #[test]
    fn already_handled_only_closes() {
        let prompts = Prompts::default();
        let replies = render(ReplyDirective::ShowAlreadyHandledThenClose, &prompts);
        assert_eq!(replies, vec![
            OutgoingReply::text(&prompts.closing).with_keyboard(ReplyKeyboard::Remove)
        ]);
    }

    #[test]
    fn plain_prompts() {
        let prompts = Prompts::default();
        assert_eq!(
            render(ReplyDirective::ShowNamePrompt, &prompts),
            vec![OutgoingReply::text(&prompts.name)]
        );
        assert_eq!(
            render(ReplyDirective::ShowRestartPrompt, &prompts),
            vec![OutgoingReply::text(&prompts.restart)]
        );
    }
}
