//! In-memory doubles for integration tests.
//!
//! [`InMemoryBackend`] implements [`Transport`] by routing requests against
//! an in-process model of the portal REST surface, and
//! [`InMemoryIdentityProvider`] stands in for the federated provider. Both
//! expose switches for the failure modes the client must tolerate.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::domain::ports::{
    IdentityProvider, IdentityProviderError, Method, RemoteRequest, RemoteResponse, Transport,
    TransportError,
};
use crate::domain::{
    Application, ApplicationId, ApplicationStatus, Category, Credentials, Eligibility, Email,
    ExternalIdentity, Role, Scholarship, ScholarshipId, ScholarshipSummary,
};

/// Code the in-memory backend accepts for admin sign-up.
pub const ADMIN_CODE: &str = "portal-admin";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Catalogue entry with fixed text, for seeding test backends.
pub fn sample_scholarship(id: ScholarshipId, category: Category, amount: u64) -> Scholarship {
    Scholarship {
        name: format!("Scholarship {id}"),
        id,
        description: "Support for tuition and books".to_owned(),
        amount,
        deadline: DateTime::<Utc>::from_timestamp(1_798_675_200, 0).unwrap_or_default(),
        category,
        institution: "State University".to_owned(),
        apply_link: "https://example.org/apply".to_owned(),
        eligibility: Eligibility::default(),
        is_draft: false,
    }
}

#[derive(Debug)]
struct Account {
    id: String,
    password: String,
}

#[derive(Debug, Default)]
struct ProviderState {
    accounts: BTreeMap<Email, Account>,
    issued: u64,
    unavailable: bool,
    refuse_deletes: bool,
    sign_outs: u64,
}

/// Federated identity provider double keyed by e-mail.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    state: Mutex<ProviderState>,
}

impl InMemoryIdentityProvider {
    /// Provider with no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account directly, bypassing sign-up.
    pub fn seed_account(&self, email: &Email, password: &str) {
        let mut state = lock(&self.state);
        state.issued += 1;
        let id = format!("uid-{}", state.issued);
        state.accounts.insert(
            email.clone(),
            Account {
                id,
                password: password.to_owned(),
            },
        );
    }

    /// Whether an identity exists for `email`.
    pub fn has_account(&self, email: &Email) -> bool {
        lock(&self.state).accounts.contains_key(email)
    }

    /// Make every call fail as if the provider were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Make identity deletion fail.
    pub fn refuse_deletes(&self, refuse: bool) {
        lock(&self.state).refuse_deletes = refuse;
    }

    /// Number of provider sign-outs observed.
    pub fn sign_outs(&self) -> u64 {
        lock(&self.state).sign_outs
    }

    fn guard(state: &ProviderState) -> Result<(), IdentityProviderError> {
        if state.unavailable {
            return Err(IdentityProviderError::unavailable("provider offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_up(
        &self,
        credentials: &Credentials,
    ) -> Result<ExternalIdentity, IdentityProviderError> {
        let mut state = lock(&self.state);
        Self::guard(&state)?;
        let email = credentials.email();
        if state.accounts.contains_key(email) {
            return Err(IdentityProviderError::exists_for(email));
        }
        state.issued += 1;
        let id = format!("uid-{}", state.issued);
        let credential = format!("id-token-{}", state.issued);
        state.accounts.insert(
            email.clone(),
            Account {
                id: id.clone(),
                password: credentials.password().to_owned(),
            },
        );
        Ok(ExternalIdentity::new(id, email.clone(), credential))
    }

    async fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> Result<ExternalIdentity, IdentityProviderError> {
        let mut state = lock(&self.state);
        Self::guard(&state)?;
        let email = credentials.email();
        let id = match state.accounts.get(email) {
            Some(account) if account.password == credentials.password() => account.id.clone(),
            _ => return Err(IdentityProviderError::invalid_credential("INVALID_LOGIN_CREDENTIALS")),
        };
        state.issued += 1;
        let credential = format!("id-token-{}", state.issued);
        Ok(ExternalIdentity::new(id, email.clone(), credential))
    }

    async fn delete(&self, identity: &ExternalIdentity) -> Result<(), IdentityProviderError> {
        let mut state = lock(&self.state);
        Self::guard(&state)?;
        if state.refuse_deletes {
            return Err(IdentityProviderError::rejected("CREDENTIAL_TOO_OLD_LOGIN_AGAIN"));
        }
        let owned = state
            .accounts
            .get(identity.email())
            .is_some_and(|account| account.id == identity.id());
        if owned {
            state.accounts.remove(identity.email());
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), IdentityProviderError> {
        let mut state = lock(&self.state);
        Self::guard(&state)?;
        state.sign_outs += 1;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Member {
    role: Role,
    email: String,
    password: Option<String>,
}

#[derive(Debug, Clone)]
struct Grant {
    role: Role,
    email: String,
}

#[derive(Debug, Default)]
struct BackendState {
    members: Vec<Member>,
    grants: BTreeMap<String, Grant>,
    scholarships: Vec<Scholarship>,
    saved: BTreeMap<String, Vec<ScholarshipId>>,
    applications: BTreeMap<String, Vec<Application>>,
    profiles: BTreeMap<String, Value>,
    requests: Vec<RemoteRequest>,
    latency: BTreeMap<String, VecDeque<Duration>>,
    sign_up_refusal: Option<(u16, String)>,
    offline: bool,
    issued: u64,
}

/// Scholarship portal REST backend held in memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
}

impl InMemoryBackend {
    /// Backend with an empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend seeded with `scholarships`.
    pub fn with_scholarships(scholarships: impl IntoIterator<Item = Scholarship>) -> Self {
        let backend = Self::new();
        lock(&backend.state).scholarships.extend(scholarships);
        backend
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<RemoteRequest> {
        lock(&self.state).requests.clone()
    }

    /// Requests received for `method` and `path`.
    pub fn count(&self, method: Method, path: &str) -> usize {
        lock(&self.state)
            .requests
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    /// Fail every request at the connection level.
    pub fn set_offline(&self, offline: bool) {
        lock(&self.state).offline = offline;
    }

    /// Answer every first-party sign-up with `status` and `message`.
    pub fn refuse_sign_ups(&self, status: u16, message: &str) {
        lock(&self.state).sign_up_refusal = Some((status, message.to_owned()));
    }

    /// Delay the next `GET` requests for `path` by the given durations, in
    /// order.
    pub fn delay_reads(&self, path: &str, delays: impl IntoIterator<Item = Duration>) {
        lock(&self.state)
            .latency
            .entry(path.to_owned())
            .or_default()
            .extend(delays);
    }

    /// Invalidate every issued token.
    pub fn revoke_all_tokens(&self) {
        lock(&self.state).grants.clear();
    }

    /// Move an application to `status`, as a reviewer would.
    pub fn review(&self, id: &ApplicationId, status: ApplicationStatus) {
        let mut state = lock(&self.state);
        for application in state.applications.values_mut().flatten() {
            if &application.id == id {
                application.status = status;
            }
        }
    }

    /// Applications held for `email`.
    pub fn applications_of(&self, email: &str) -> Vec<Application> {
        lock(&self.state)
            .applications
            .get(email)
            .cloned()
            .unwrap_or_default()
    }

    /// Last profile stored for `email`.
    pub fn profile_of(&self, email: &str) -> Option<Value> {
        lock(&self.state).profiles.get(email).cloned()
    }

    /// Whether a first-party account exists for `email` in `role`.
    pub fn has_member(&self, role: Role, email: &str) -> bool {
        lock(&self.state)
            .members
            .iter()
            .any(|member| member.role == role && member.email == email)
    }
}

#[async_trait]
impl Transport for InMemoryBackend {
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError> {
        let delay = {
            let mut state = lock(&self.state);
            state.requests.push(request.clone());
            if state.offline {
                return Err(TransportError::connection("backend offline"));
            }
            if request.method == Method::Get {
                state
                    .latency
                    .get_mut(&request.path)
                    .and_then(VecDeque::pop_front)
            } else {
                None
            }
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = lock(&self.state);
        Ok(state.route(&request))
    }
}

fn respond(status: u16, body: Value) -> RemoteResponse {
    RemoteResponse::new(status, body)
}

fn refuse(status: u16, message: &str) -> RemoteResponse {
    respond(status, json!({ "message": message }))
}

fn field<'a>(body: Option<&'a Value>, name: &str) -> Option<&'a str> {
    body.and_then(|body| body.get(name)).and_then(Value::as_str)
}

fn as_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl BackendState {
    fn route(&mut self, request: &RemoteRequest) -> RemoteResponse {
        let segments: Vec<&str> = request
            .path
            .trim_start_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let body = request.body.as_ref();
        match (request.method, segments.as_slice()) {
            (Method::Post, ["auth", "signup"]) => self.sign_up(Role::User, body),
            (Method::Post, ["admin", "signup"]) => self.sign_up(Role::Admin, body),
            (Method::Post, ["auth", "signin"]) => self.sign_in(Role::User, body),
            (Method::Post, ["admin", "signin"]) => self.sign_in(Role::Admin, body),
            (Method::Get, ["scholarships"]) => self.list(request),
            (Method::Get, ["scholarships", id]) => self.detail(id),
            (Method::Post, ["admin", "scholarships"]) => self.create(request),
            (Method::Get, ["user", "saved-scholarships"]) => self.saved(request),
            (Method::Post, ["user", "saved-scholarships", id]) => self.save(request, id),
            (Method::Delete, ["user", "saved-scholarships", id]) => self.unsave(request, id),
            (Method::Get, ["user", "applications"]) => self.list_applications(request),
            (Method::Post, ["user", "applications", id]) => self.apply(request, id),
            (Method::Put, ["user", "profile"]) => self.update_profile(request),
            _ => refuse(404, "Route not found"),
        }
    }

    fn issue(&mut self, role: Role, email: &str) -> String {
        self.issued += 1;
        let claims = json!({
            "userId": format!("member-{}", self.issued),
            "role": if role == Role::Admin { "ADMIN" } else { "USER" },
        });
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let token = format!("eyJhbGciOiJub25lIn0.{payload}.sig-{}", self.issued);
        self.grants.insert(
            token.clone(),
            Grant {
                role,
                email: email.to_owned(),
            },
        );
        token
    }

    fn authorize(&self, request: &RemoteRequest, role: Role) -> Result<String, RemoteResponse> {
        let Some(token) = request.bearer.as_deref() else {
            return Err(refuse(401, "No token provided"));
        };
        match self.grants.get(token) {
            None => Err(refuse(401, "Invalid or expired token")),
            Some(grant) if grant.role != role => Err(refuse(403, "Access denied")),
            Some(grant) => Ok(grant.email.clone()),
        }
    }

    fn sign_up(&mut self, role: Role, body: Option<&Value>) -> RemoteResponse {
        if let Some((status, message)) = self.sign_up_refusal.clone() {
            return refuse(status, &message);
        }
        let federated = body
            .and_then(|body| body.get("isGoogleUser"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let password = field(body, "password");
        let (Some(email), Some(_)) = (field(body, "email"), field(body, "fullName")) else {
            return refuse(400, "email and fullName are required");
        };
        if password.is_none() && !federated {
            return refuse(400, "password is required");
        }
        if role == Role::Admin && field(body, "adminCode") != Some(ADMIN_CODE) {
            return refuse(403, "Invalid admin code");
        }
        let exists = self
            .members
            .iter()
            .any(|member| member.role == role && member.email == email);
        if exists {
            return refuse(409, "User already exists");
        }
        self.members.push(Member {
            role,
            email: email.to_owned(),
            password: password.map(str::to_owned),
        });
        let token = self.issue(role, email);
        respond(201, json!({ "token": token }))
    }

    fn sign_in(&mut self, role: Role, body: Option<&Value>) -> RemoteResponse {
        let Some(email) = field(body, "email") else {
            return refuse(400, "email is required");
        };
        let federated = body
            .and_then(|body| body.get("isGoogleUser"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let member = self
            .members
            .iter()
            .find(|member| member.role == role && member.email == email)
            .cloned();
        match member {
            Some(member) if federated || member.password.as_deref() == field(body, "password") => {}
            Some(_) => return refuse(401, "Invalid credentials"),
            None if federated && role == Role::User => self.members.push(Member {
                role,
                email: email.to_owned(),
                password: None,
            }),
            None => return refuse(404, "User not found"),
        }
        let token = self.issue(role, email);
        respond(200, json!({ "token": token }))
    }

    fn caller_is_admin(&self, request: &RemoteRequest) -> bool {
        request
            .bearer
            .as_deref()
            .and_then(|token| self.grants.get(token))
            .is_some_and(|grant| grant.role == Role::Admin)
    }

    fn list(&self, request: &RemoteRequest) -> RemoteResponse {
        let query = |name: &str| {
            request
                .query
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };
        let bound = |name: &str| query(name).and_then(|value| value.parse::<u64>().ok());
        let include_drafts = self.caller_is_admin(request);
        let listed: Vec<&Scholarship> = self
            .scholarships
            .iter()
            .filter(|item| include_drafts || !item.is_draft)
            .filter(|item| query("category").is_none_or(|wanted| item.category.as_str() == wanted))
            .filter(|item| bound("minAmount").is_none_or(|min| item.amount >= min))
            .filter(|item| bound("maxAmount").is_none_or(|max| item.amount <= max))
            .collect();
        respond(200, as_json(&listed))
    }

    fn find(&self, id: &str) -> Option<&Scholarship> {
        self.scholarships.iter().find(|item| item.id.as_ref() == id)
    }

    fn detail(&self, id: &str) -> RemoteResponse {
        match self.find(id) {
            Some(scholarship) => respond(200, as_json(scholarship)),
            None => refuse(404, "Scholarship not found"),
        }
    }

    fn create(&mut self, request: &RemoteRequest) -> RemoteResponse {
        if let Err(response) = self.authorize(request, Role::Admin) {
            return response;
        }
        self.issued += 1;
        let mut payload = request.body.clone().unwrap_or(Value::Null);
        let Some(object) = payload.as_object_mut() else {
            return refuse(400, "Scholarship payload must be an object");
        };
        object.insert("id".to_owned(), json!(format!("sch-created-{}", self.issued)));
        match serde_json::from_value::<Scholarship>(payload) {
            Ok(scholarship) => {
                self.scholarships.insert(0, scholarship.clone());
                respond(201, as_json(&scholarship))
            }
            Err(error) => refuse(400, &error.to_string()),
        }
    }

    fn saved(&self, request: &RemoteRequest) -> RemoteResponse {
        let email = match self.authorize(request, Role::User) {
            Ok(email) => email,
            Err(response) => return response,
        };
        let entries: Vec<Value> = self
            .saved
            .get(&email)
            .into_iter()
            .flatten()
            .filter_map(|id| self.find(id.as_ref()))
            .map(|scholarship| json!({ "scholarship": as_json(scholarship) }))
            .collect();
        respond(200, Value::Array(entries))
    }

    fn save(&mut self, request: &RemoteRequest, id: &str) -> RemoteResponse {
        let email = match self.authorize(request, Role::User) {
            Ok(email) => email,
            Err(response) => return response,
        };
        let Some(scholarship) = self.find(id).cloned() else {
            return refuse(404, "Scholarship not found");
        };
        let saved = self.saved.entry(email).or_default();
        if !saved.contains(&scholarship.id) {
            saved.push(scholarship.id.clone());
        }
        respond(201, json!({ "scholarship": as_json(&scholarship) }))
    }

    fn unsave(&mut self, request: &RemoteRequest, id: &str) -> RemoteResponse {
        let email = match self.authorize(request, Role::User) {
            Ok(email) => email,
            Err(response) => return response,
        };
        if let Some(saved) = self.saved.get_mut(&email) {
            saved.retain(|saved_id| saved_id.as_ref() != id);
        }
        respond(200, json!({ "message": "Scholarship removed from saved list" }))
    }

    fn list_applications(&self, request: &RemoteRequest) -> RemoteResponse {
        let email = match self.authorize(request, Role::User) {
            Ok(email) => email,
            Err(response) => return response,
        };
        let applications = self.applications.get(&email).cloned().unwrap_or_default();
        respond(200, as_json(&applications))
    }

    fn apply(&mut self, request: &RemoteRequest, id: &str) -> RemoteResponse {
        let email = match self.authorize(request, Role::User) {
            Ok(email) => email,
            Err(response) => return response,
        };
        let Some(summary) = self.find(id).map(ScholarshipSummary::from) else {
            return refuse(404, "Scholarship not found");
        };
        let scholarship_id = summary.id.clone();
        self.issued += 1;
        let issued = self.issued;
        let applications = self.applications.entry(email).or_default();
        if applications
            .iter()
            .any(|application| application.scholarship_id == scholarship_id)
        {
            return refuse(400, "Already applied for this scholarship");
        }
        let application = Application {
            id: ApplicationId::new(format!("app-{issued}")),
            scholarship_id,
            status: ApplicationStatus::INITIAL,
            applied_at: Utc::now(),
            scholarship: Some(summary),
        };
        applications.push(application.clone());
        respond(201, as_json(&application))
    }

    fn update_profile(&mut self, request: &RemoteRequest) -> RemoteResponse {
        let email = match self.authorize(request, Role::User) {
            Ok(email) => email,
            Err(response) => return response,
        };
        let profile = request.body.clone().unwrap_or(Value::Null);
        self.profiles.insert(email, profile);
        respond(200, json!({ "message": "Profile updated" }))
    }
}
