//! RegistrationService: runs the dialog engine for one event at a time per
//! user, against the session table and the registration store.

use std::sync::Arc;

use tracing::{debug, info};

use super::engine::{self, SessionChange, Step};
use super::event::{InboundEvent, ReplyDirective};
use super::UserId;
use crate::error::DialogError;
use crate::session::SessionTable;
use crate::store::{RegistrationRecord, RegistrationStore};

/// Entry point the inbound adapters call for every event.
pub struct RegistrationService {
    sessions: Arc<SessionTable>,
    store: Arc<dyn RegistrationStore>,
}

impl RegistrationService {
    pub fn new(sessions: Arc<SessionTable>, store: Arc<dyn RegistrationStore>) -> Self {
        Self { sessions, store }
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<dyn RegistrationStore> {
        &self.store
    }

    /// Handle one inbound event and return what to show the user.
    ///
    /// The user's session stays locked for the whole call, so events for the
    /// same user are processed one after another. On a store failure the
    /// session is left as it was before the event and the error is returned;
    /// redelivering the same event is safe.
    pub async fn handle_event(
        &self,
        user_id: UserId,
        event: InboundEvent,
    ) -> Result<ReplyDirective, DialogError> {
        let mut slot = self.sessions.lock(user_id).await;
        let stage = slot.get().map(|s| s.stage);

        let directive = match engine::step(slot.get(), &event) {
            Step::Reply { change, directive } => {
                if let SessionChange::Set(session) = change {
                    slot.set(session);
                }
                directive
            }
            Step::LookupRegistration => {
                let registered = self.store.registration_exists(user_id).await?;
                engine::after_lookup(registered)
            }
            Step::Register { name, phone } => {
                let record = RegistrationRecord::new(user_id, name, phone);
                let inserted = self.store.register_if_absent(&record).await?;
                slot.remove();
                if inserted {
                    info!(user_id, "Registration recorded");
                } else {
                    info!(user_id, "Registration already present, closing dialog");
                }
                engine::after_register(inserted)
            }
        };

        debug!(
            user_id,
            kind = ?event.kind,
            stage = ?stage,
            next_stage = ?slot.get().map(|s| s.stage),
            %directive,
            "Dialog event handled"
        );
        Ok(directive)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::dialog::{EventKind, Stage};
    use crate::error::DatabaseError;
    use crate::store::LibSqlBackend;

    async fn service() -> RegistrationService {
        let store = LibSqlBackend::new_memory().await.unwrap();
        RegistrationService::new(Arc::new(SessionTable::new()), Arc::new(store))
    }

    /// Store wrapper that fails every call while `down` is set.
    struct FlakyStore {
        inner: LibSqlBackend,
        down: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> Result<(), DatabaseError> {
            if self.down.load(Ordering::SeqCst) {
                Err(DatabaseError::Pool("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RegistrationStore for FlakyStore {
        async fn init_schema(&self) -> Result<(), DatabaseError> {
            self.inner.init_schema().await
        }
        async fn registration_exists(&self, user_id: UserId) -> Result<bool, DatabaseError> {
            self.check()?;
            self.inner.registration_exists(user_id).await
        }
        async fn register_if_absent(
            &self,
            record: &RegistrationRecord,
        ) -> Result<bool, DatabaseError> {
            self.check()?;
            self.inner.register_if_absent(record).await
        }
        async fn list_registrations(&self) -> Result<Vec<RegistrationRecord>, DatabaseError> {
            self.check()?;
            self.inner.list_registrations().await
        }
        async fn count_registrations(&self) -> Result<usize, DatabaseError> {
            self.check()?;
            self.inner.count_registrations().await
        }
    }

    #[tokio::test]
    async fn full_dialog_registers_and_clears_session() {
        let svc = service().await;

        assert_eq!(
            svc.handle_event(42, InboundEvent::start()).await.unwrap(),
            ReplyDirective::ShowNamePrompt
        );
        assert_eq!(
            svc.handle_event(42, InboundEvent::text("Abebe Kebede")).await.unwrap(),
            ReplyDirective::ShowPhonePromptWithContactButton
        );
        let session = svc.sessions().get(42).await.unwrap();
        assert_eq!(session.stage, Stage::AwaitingPhone);
        assert_eq!(session.collected.name.as_deref(), Some("Abebe Kebede"));

        assert_eq!(
            svc.handle_event(42, InboundEvent::contact("+251911000000"))
                .await
                .unwrap(),
            ReplyDirective::ShowConfirmationThenClose
        );
        assert!(svc.sessions().get(42).await.is_none());
        assert!(svc.sessions().is_empty());

        let records = svc.store().list_registrations().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, 42);
        assert_eq!(records[0].name, "Abebe Kebede");
        assert_eq!(records[0].phone, "+251911000000");
    }

    #[tokio::test]
    async fn restart_prompt_without_session() {
        let svc = service().await;
        assert_eq!(
            svc.handle_event(7, InboundEvent::text("hello")).await.unwrap(),
            ReplyDirective::ShowRestartPrompt
        );
        assert!(svc.sessions().get(7).await.is_none());
    }

    #[tokio::test]
    async fn registering_twice_does_not_confirm_twice() {
        let svc = service().await;
        svc.handle_event(42, InboundEvent::start()).await.unwrap();
        svc.handle_event(42, InboundEvent::text("Abebe Kebede")).await.unwrap();
        assert_eq!(
            svc.handle_event(42, InboundEvent::contact("+251911000000"))
                .await
                .unwrap(),
            ReplyDirective::ShowConfirmationThenClose
        );
        svc.handle_event(42, InboundEvent::start()).await.unwrap();
        svc.handle_event(42, InboundEvent::text("Abebe Again")).await.unwrap();
        assert_eq!(
            svc.handle_event(42, InboundEvent::text("0911000000")).await.unwrap(),
            ReplyDirective::ShowAlreadyHandledThenClose
        );
        assert!(svc.sessions().get(42).await.is_none());
        assert_eq!(svc.store().count_registrations().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn store_failure_leaves_session_untouched() {
        let store = Arc::new(FlakyStore {
            inner: LibSqlBackend::new_memory().await.unwrap(),
            down: AtomicBool::new(false),
        });
        let svc = RegistrationService::new(Arc::new(SessionTable::new()), store.clone());

        svc.handle_event(9, InboundEvent::start()).await.unwrap();
        svc.handle_event(9, InboundEvent::text("Abebe Kebede")).await.unwrap();
        let before = svc.sessions().get(9).await.unwrap();

        store.down.store(true, Ordering::SeqCst);
        let err = svc
            .handle_event(9, InboundEvent::contact("+251911000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, DialogError::StoreUnavailable(_)));
        assert_eq!(svc.sessions().get(9).await, Some(before));

        // Lookup path fails the same way and creates nothing.
        let err = svc.handle_event(10, InboundEvent::text("hi")).await.unwrap_err();
        assert!(matches!(err, DialogError::StoreUnavailable(_)));
        assert!(svc.sessions().get(10).await.is_none());

        // Redelivery after recovery completes normally.
        store.down.store(false, Ordering::SeqCst);
        assert_eq!(
            svc.handle_event(9, InboundEvent::contact("+251911000000"))
                .await
                .unwrap(),
            ReplyDirective::ShowConfirmationThenClose
        );
    }

    #[tokio::test]
    async fn empty_contact_while_awaiting_phone_reprompts() {
        let svc = service().await;
        svc.handle_event(3, InboundEvent::start()).await.unwrap();
        svc.handle_event(3, InboundEvent::text("Abebe")).await.unwrap();
        let before = svc.sessions().get(3).await.unwrap();

        assert_eq!(
            svc.handle_event(3, InboundEvent::new(EventKind::Contact, None))
                .await
                .unwrap(),
            ReplyDirective::ShowPhonePromptWithContactButton
        );
        assert_eq!(svc.sessions().get(3).await, Some(before));
        assert_eq!(svc.store().count_registrations().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupt_session_is_replaced() {
        let svc = service().await;
        let mut corrupt = crate::dialog::Session::new();
        corrupt.stage = Stage::AwaitingPhone;
        svc.sessions().set(11, corrupt).await;

        assert_eq!(
            svc.handle_event(11, InboundEvent::contact("+251911000000"))
                .await
                .unwrap(),
            ReplyDirective::ShowNamePrompt
        );
        let fresh = svc.sessions().get(11).await.unwrap();
        assert_eq!(fresh.stage, Stage::AwaitingName);
        assert!(fresh.is_consistent());
        assert_eq!(svc.store().count_registrations().await.unwrap(), 0);
    }
}
