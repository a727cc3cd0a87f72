#![allow(missing_docs)]

pub(crate) mod form;
pub(crate) mod html;
pub(crate) mod http;

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::Notify;

use crate::{
    Error,
    auth::{AuthProvider, HelperSession, Role, Session},
    distributor::{ClientDistributor, DistributorConfig, DistributorRepository},
    profile::{AdminProfile, ProfileRepository},
    timezone::Clock,
    transaction::{TransactionRecord, TransactionRepository},
};

pub(crate) use form::{assert_form_input_with_value, assert_hx_endpoint, must_get_form};
pub(crate) use html::{assert_valid_html, parse_html_document, parse_html_fragment};
pub(crate) use http::assert_hx_redirect;

/// An auth provider that accepts any password for one configured user.
#[derive(Debug, Default)]
pub(crate) struct FakeAuthProvider {
    user_id: Option<String>,
    token: String,
    session: Mutex<Option<Session>>,
    helper: Option<HelperSession>,
    sign_outs: AtomicUsize,
}

impl FakeAuthProvider {
    /// Signing in as anyone yields `user_id` with the token "token-{user_id}".
    pub(crate) fn with_user(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_owned()),
            token: format!("token-{user_id}"),
            ..Default::default()
        }
    }

    /// `user_id` is already signed in with `token`.
    pub(crate) fn with_session(user_id: &str, token: &str) -> Self {
        Self {
            user_id: Some(user_id.to_owned()),
            token: token.to_owned(),
            session: Mutex::new(Some(Session {
                access_token: token.to_owned(),
                user_id: user_id.to_owned(),
                email: None,
            })),
            ..Default::default()
        }
    }

    /// Helper logins succeed with `token`, scoped to `admin_id`.
    pub(crate) fn with_helper(token: &str, admin_id: &str) -> Self {
        Self {
            helper: Some(HelperSession {
                success: true,
                message: String::new(),
                token: token.to_owned(),
                helper_id: "helper-9".to_owned(),
                admin_id: admin_id.to_owned(),
                timezone: "America/Lima".to_owned(),
            }),
            ..Default::default()
        }
    }

    /// Helper logins are refused with `message`.
    pub(crate) fn with_rejected_helper(message: &str) -> Self {
        Self {
            helper: Some(HelperSession {
                success: false,
                message: message.to_owned(),
                token: String::new(),
                helper_id: String::new(),
                admin_id: String::new(),
                timezone: String::new(),
            }),
            ..Default::default()
        }
    }

    pub(crate) fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for FakeAuthProvider {
    async fn sign_in_with_password(&self, email: &str, _password: &str) -> Result<Session, Error> {
        let Some(user_id) = &self.user_id else {
            return Err(Error::InvalidCredentials(
                "Invalid login credentials".to_owned(),
            ));
        };

        let session = Session {
            access_token: self.token.clone(),
            user_id: user_id.clone(),
            email: Some(email.to_owned()),
        };
        *self.session.lock().unwrap() = Some(session.clone());

        Ok(session)
    }

    async fn login_helper(&self, _phone: &str, _password: &str) -> Result<HelperSession, Error> {
        self.helper
            .clone()
            .ok_or_else(|| Error::Platform(404, "fn_login_ayudante".to_owned()))
    }

    async fn current_session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    async fn sign_out(&self) -> Result<(), Error> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        *self.session.lock().unwrap() = None;

        Ok(())
    }
}

/// Profiles kept in memory.
#[derive(Debug, Default)]
pub(crate) struct FakeProfiles {
    roles: HashMap<String, Role>,
    admins: HashMap<String, AdminProfile>,
}

impl FakeProfiles {
    pub(crate) fn with_role(user_id: &str, role: Role) -> Self {
        Self::default().and_role(user_id, role)
    }

    pub(crate) fn and_role(mut self, user_id: &str, role: Role) -> Self {
        self.roles.insert(user_id.to_owned(), role);
        self
    }

    pub(crate) fn and_admin_profile(mut self, admin_id: &str, profile: AdminProfile) -> Self {
        self.admins.insert(admin_id.to_owned(), profile);
        self
    }
}

#[async_trait]
impl ProfileRepository for FakeProfiles {
    async fn get_role(&self, user_id: &str) -> Result<Option<Role>, Error> {
        Ok(self.roles.get(user_id).copied())
    }

    async fn get_admin_profile(&self, admin_id: &str) -> Result<Option<AdminProfile>, Error> {
        Ok(self.admins.get(admin_id).cloned())
    }
}

/// A historical query that returns the same records for any range.
#[derive(Debug, Default)]
pub(crate) struct FakeTransactionRepository {
    records: Mutex<Vec<TransactionRecord>>,
    calls: Mutex<Vec<(String, OffsetDateTime, OffsetDateTime)>>,
    failure: Mutex<Option<Error>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeTransactionRepository {
    pub(crate) fn with_records(records: Vec<TransactionRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    pub(crate) fn set_records(&self, records: Vec<TransactionRecord>) {
        *self.records.lock().unwrap() = records;
    }

    /// The (viewer, start, end) of every query so far.
    pub(crate) fn calls(&self) -> Vec<(String, OffsetDateTime, OffsetDateTime)> {
        self.calls.lock().unwrap().clone()
    }

    /// Make the next query fail with `error`.
    pub(crate) fn fail_next(&self, error: Error) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Make every query wait for a notification on the returned gate before answering.
    pub(crate) fn hold_responses(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());

        gate
    }
}

#[async_trait]
impl TransactionRepository for FakeTransactionRepository {
    async fn get_transactions_by_date(
        &self,
        viewer_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TransactionRecord>, Error> {
        self.calls
            .lock()
            .unwrap()
            .push((viewer_id.to_owned(), start, end));

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(error) = self.failure.lock().unwrap().take() {
            return Err(error);
        }

        Ok(self.records.lock().unwrap().clone())
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub(crate) struct SharedClock(Mutex<OffsetDateTime>);

impl SharedClock {
    pub(crate) fn new(now: OffsetDateTime) -> Self {
        Self(Mutex::new(now))
    }

    pub(crate) fn advance(&self, duration: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += duration;
    }
}

impl Clock for SharedClock {
    fn now_utc(&self) -> OffsetDateTime {
        *self.0.lock().unwrap()
    }
}

/// Distributor data kept in memory.
#[derive(Debug, Default)]
pub(crate) struct FakeDistributors {
    config: Option<DistributorConfig>,
    clients: Vec<ClientDistributor>,
    taken_codes: Mutex<HashSet<String>>,
    updates: Mutex<Vec<(String, String)>>,
}

impl FakeDistributors {
    pub(crate) fn new(config: Option<DistributorConfig>, clients: Vec<ClientDistributor>) -> Self {
        Self {
            config,
            clients,
            ..Default::default()
        }
    }

    pub(crate) fn take_code(&self, code: &str) {
        self.taken_codes.lock().unwrap().insert(code.to_owned());
    }

    /// The (distributor, code) of every referral code change.
    pub(crate) fn updates(&self) -> Vec<(String, String)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl DistributorRepository for FakeDistributors {
    async fn get_config(&self, _distributor_id: &str) -> Result<Option<DistributorConfig>, Error> {
        Ok(self.config.clone())
    }

    async fn is_code_available(&self, code: &str) -> Result<bool, Error> {
        Ok(!self.taken_codes.lock().unwrap().contains(code))
    }

    async fn update_referral_code(&self, distributor_id: &str, code: &str) -> Result<(), Error> {
        self.updates
            .lock()
            .unwrap()
            .push((distributor_id.to_owned(), code.to_owned()));
        self.taken_codes.lock().unwrap().insert(code.to_owned());

        Ok(())
    }

    async fn list_clients(&self, _distributor_id: &str) -> Result<Vec<ClientDistributor>, Error> {
        Ok(self.clients.clone())
    }
}
