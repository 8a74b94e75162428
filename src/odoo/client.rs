//! Odoo client
//!
//! Login, session caching and retry-wrapped `execute_kw` calls on top of a
//! [`Transport`].

use super::error::{AuthError, CallFailure, OdooError};
use super::retry::RetryPolicy;
use super::session::{Session, SessionState, SessionStore};
use crate::config::ConnectionProfile;
use crate::xmlrpc::{HttpTransport, Service, Transport, Value, XmlRpcError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::sleep;

/// Options for `search` / `search_read`
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub fields: Option<Vec<String>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order: Option<String>,
}

impl SearchOptions {
    fn into_kwargs(self) -> BTreeMap<String, Value> {
        let mut kwargs = BTreeMap::new();
        kwargs.insert(
            "offset".to_string(),
            Value::Int(i64::from(self.offset.unwrap_or(0))),
        );
        if let Some(fields) = self.fields.filter(|f| !f.is_empty()) {
            kwargs.insert("fields".to_string(), string_array(&fields));
        }
        if let Some(limit) = self.limit {
            kwargs.insert("limit".to_string(), Value::Int(i64::from(limit)));
        }
        if let Some(order) = self.order.filter(|o| !o.trim().is_empty()) {
            kwargs.insert("order".to_string(), Value::String(order));
        }
        kwargs
    }
}

/// Client for one Odoo database
pub struct OdooClient {
    profile: ConnectionProfile,
    transport: Arc<dyn Transport>,
    sessions: Arc<SessionStore>,
    retry: RetryPolicy,
}

impl OdooClient {
    /// Create a client with its own, empty session store
    pub fn new(profile: ConnectionProfile, transport: Arc<dyn Transport>) -> Self {
        Self::with_session_store(profile, transport, Arc::new(SessionStore::new()))
    }

    /// Create a client that shares an existing session store
    pub fn with_session_store(
        profile: ConnectionProfile,
        transport: Arc<dyn Transport>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let retry = RetryPolicy::from(profile.settings());
        Self {
            profile,
            transport,
            sessions,
            retry,
        }
    }

    /// Create a client talking HTTP to the profile's URL
    pub fn connect_http(profile: ConnectionProfile) -> Result<Self, OdooError> {
        let transport = HttpTransport::new(profile.url(), profile.timeout())
            .map_err(|e| OdooError::Protocol(e.to_string()))?;
        Ok(Self::new(profile, Arc::new(transport)))
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(self.sessions.state().await, SessionState::Active(_))
    }

    /// Log in unconditionally, replacing any cached session
    pub async fn authenticate(&self) -> Result<Arc<Session>, OdooError> {
        let _guard = self.sessions.login_guard().await;
        self.sessions.clear().await;
        self.login().await
    }

    /// Return the cached session, logging in first if there is none
    pub async fn ensure_session(&self) -> Result<Arc<Session>, OdooError> {
        if let SessionState::Active(session) = self.sessions.state().await {
            return Ok(session);
        }

        let _guard = self.sessions.login_guard().await;
        // Another task may have logged in while we waited
        if let SessionState::Active(session) = self.sessions.state().await {
            return Ok(session);
        }
        self.login().await
    }

    /// Replace a session the server refused. Only one caller logs in; the
    /// others pick up its result.
    async fn refresh_session(&self, stale: &Arc<Session>) -> Result<Arc<Session>, OdooError> {
        let _guard = self.sessions.login_guard().await;
        if !self.sessions.invalidate(stale).await {
            if let SessionState::Active(session) = self.sessions.state().await {
                return Ok(session);
            }
        }
        self.login().await
    }

    /// Caller must hold the login guard
    async fn login(&self) -> Result<Arc<Session>, OdooError> {
        let profile = &self.profile;

        let version = self
            .execute_with_retry(Service::Common, "version", &[])
            .await
            .map_err(|f| self.auth_failure(f))?;
        let server_version = version
            .get("server_version")
            .and_then(Value::as_str)
            .map(String::from);

        let secret = profile.credential().secret();
        let params = [
            Value::from(profile.database()),
            Value::from(profile.username()),
            Value::from(secret),
            Value::empty_struct(),
        ];

        let uid = self
            .execute_with_retry(Service::Common, "authenticate", &params)
            .await
            .map_err(|f| self.auth_failure(f))?;

        match uid {
            Value::Int(uid) if uid > 0 => {
                tracing::info!(
                    "Authenticated as '{}' (uid {}) on database '{}' using {}",
                    profile.username(),
                    uid,
                    profile.database(),
                    profile.credential().kind()
                );
                let session = Session::new(uid, secret, server_version);
                Ok(self.sessions.replace(session).await)
            }
            _ => {
                tracing::warn!(
                    "Login refused for '{}' on database '{}'",
                    profile.username(),
                    profile.database()
                );
                Err(AuthError::InvalidCredentials {
                    username: profile.username().to_string(),
                    database: profile.database().to_string(),
                }
                .into())
            }
        }
    }

    fn auth_failure(&self, failure: CallFailure) -> OdooError {
        let error = if failure.error.is_transient() {
            AuthError::Unreachable {
                url: self.profile.url().to_string(),
                attempts: failure.attempts,
                reason: failure.error.to_string(),
            }
        } else {
            match failure.error {
                XmlRpcError::Fault(fault) => AuthError::Rejected(fault.to_string()),
                XmlRpcError::Request(reason) => AuthError::Unreachable {
                    url: self.profile.url().to_string(),
                    attempts: failure.attempts,
                    reason,
                },
                other => AuthError::Rejected(other.to_string()),
            }
        };
        tracing::warn!("Authentication against {} failed: {}", self.profile.url(), error);
        error.into()
    }

    /// Server version information from the `common` service
    pub async fn version(&self) -> Result<Value, OdooError> {
        Ok(self
            .execute_with_retry(Service::Common, "version", &[])
            .await?)
    }

    /// Run `model.method(*args, **kwargs)` through `execute_kw`.
    ///
    /// Logs in first when no session exists. If the server answers with
    /// access denied, the session is dropped, a fresh login is made and the
    /// call is repeated once.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    ) -> Result<Value, OdooError> {
        let args = Value::Array(args);
        let kwargs = Value::Struct(kwargs);

        let session = self.ensure_session().await?;
        match self.call_object(&session, model, method, &args, &kwargs).await {
            Err(CallFailure {
                error: XmlRpcError::Fault(fault),
                ..
            }) if fault.is_access_denied() => {
                tracing::warn!(
                    "Session for uid {} was refused ({}); re-authenticating",
                    session.uid(),
                    fault
                );
                let session = self.refresh_session(&session).await?;
                Ok(self
                    .call_object(&session, model, method, &args, &kwargs)
                    .await?)
            }
            result => Ok(result?),
        }
    }

    async fn call_object(
        &self,
        session: &Session,
        model: &str,
        method: &str,
        args: &Value,
        kwargs: &Value,
    ) -> Result<Value, CallFailure> {
        let params = [
            Value::from(self.profile.database()),
            Value::Int(session.uid()),
            Value::from(session.secret()),
            Value::from(model),
            Value::from(method),
            args.clone(),
            kwargs.clone(),
        ];
        self.execute_with_retry(Service::Object, "execute_kw", &params)
            .await
    }

    /// Execute one XML-RPC call, retrying transient failures
    async fn execute_with_retry(
        &self,
        service: Service,
        method: &str,
        params: &[Value],
    ) -> Result<Value, CallFailure> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.transport.call(service, method, params).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "{}.{} attempt {}/{} failed: {}; retrying in {:?}",
                        service,
                        method,
                        attempt,
                        self.retry.max_attempts(),
                        error,
                        delay
                    );
                    sleep(delay).await;
                }
                Err(error) => {
                    if error.is_transient() {
                        tracing::warn!(
                            "{}.{} attempt {}/{} failed: {}; giving up",
                            service,
                            method,
                            attempt,
                            self.retry.max_attempts(),
                            error
                        );
                    } else {
                        tracing::debug!("{}.{} failed: {}", service, method, error);
                    }
                    return Err(CallFailure {
                        error,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    /// Ids of records matching `domain`
    pub async fn search(
        &self,
        model: &str,
        domain: Value,
        options: SearchOptions,
    ) -> Result<Vec<i64>, OdooError> {
        let mut kwargs = options.into_kwargs();
        kwargs.remove("fields");
        let result = self
            .execute_kw(model, "search", vec![domain], kwargs)
            .await?;
        expect_ids("search", result)
    }

    /// Number of records matching `domain`
    pub async fn search_count(&self, model: &str, domain: Value) -> Result<i64, OdooError> {
        let result = self
            .execute_kw(model, "search_count", vec![domain], BTreeMap::new())
            .await?;
        result
            .as_i64()
            .ok_or_else(|| unexpected("search_count", "an integer", &result))
    }

    /// Records matching `domain`, in server order
    pub async fn search_read(
        &self,
        model: &str,
        domain: Value,
        options: SearchOptions,
    ) -> Result<Value, OdooError> {
        self.execute_kw(model, "search_read", vec![domain], options.into_kwargs())
            .await
    }

    pub async fn read(
        &self,
        model: &str,
        ids: &[i64],
        fields: Option<&[String]>,
    ) -> Result<Value, OdooError> {
        let mut kwargs = BTreeMap::new();
        if let Some(fields) = fields.filter(|f| !f.is_empty()) {
            kwargs.insert("fields".to_string(), string_array(fields));
        }
        self.execute_kw(model, "read", vec![id_array(ids)], kwargs)
            .await
    }

    /// Create one record and return its id
    pub async fn create(&self, model: &str, values: Value) -> Result<i64, OdooError> {
        let result = self
            .execute_kw(model, "create", vec![values], BTreeMap::new())
            .await?;
        match result {
            Value::Int(id) => Ok(id),
            // Newer servers may answer a single create with a one-element list
            Value::Array(ref ids) if ids.len() == 1 => ids[0]
                .as_i64()
                .ok_or_else(|| unexpected("create", "an id", &result)),
            other => Err(unexpected("create", "an id", &other)),
        }
    }

    pub async fn write(&self, model: &str, ids: &[i64], values: Value) -> Result<bool, OdooError> {
        let result = self
            .execute_kw(model, "write", vec![id_array(ids), values], BTreeMap::new())
            .await?;
        expect_bool("write", result)
    }

    pub async fn unlink(&self, model: &str, ids: &[i64]) -> Result<bool, OdooError> {
        let result = self
            .execute_kw(model, "unlink", vec![id_array(ids)], BTreeMap::new())
            .await?;
        expect_bool("unlink", result)
    }

    /// Field definitions of a model, optionally restricted to some attributes
    pub async fn fields_get(
        &self,
        model: &str,
        attributes: Option<&[String]>,
    ) -> Result<Value, OdooError> {
        let mut kwargs = BTreeMap::new();
        if let Some(attributes) = attributes.filter(|a| !a.is_empty()) {
            kwargs.insert("attributes".to_string(), string_array(attributes));
        }
        self.execute_kw(model, "fields_get", vec![], kwargs).await
    }

    /// Installed models from `ir.model`, sorted by technical name.
    ///
    /// `filter` matches the technical or display name, case-insensitively.
    pub async fn list_models(&self, filter: Option<&str>) -> Result<Value, OdooError> {
        let domain = match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(f) => Value::Array(vec![
                Value::from("|"),
                Value::Array(vec![Value::from("model"), Value::from("ilike"), Value::from(f)]),
                Value::Array(vec![Value::from("name"), Value::from("ilike"), Value::from(f)]),
            ]),
            None => Value::Array(vec![]),
        };

        let options = SearchOptions {
            fields: Some(vec!["model".into(), "name".into(), "info".into()]),
            order: Some("model asc".into()),
            ..Default::default()
        };
        self.search_read("ir.model", domain, options).await
    }
}

fn string_array(items: &[String]) -> Value {
    Value::Array(items.iter().map(|s| Value::from(s.as_str())).collect())
}

fn id_array(ids: &[i64]) -> Value {
    Value::Array(ids.iter().copied().map(Value::Int).collect())
}

fn unexpected(method: &str, expected: &str, got: &Value) -> OdooError {
    OdooError::Protocol(format!("{} returned {:?}, expected {}", method, got, expected))
}

fn expect_bool(method: &str, value: Value) -> Result<bool, OdooError> {
    match value {
        Value::Bool(b) => Ok(b),
        // Some models override write/unlink and return 1/0
        Value::Int(i) => Ok(i != 0),
        other => Err(unexpected(method, "a boolean", &other)),
    }
}

fn expect_ids(method: &str, value: Value) -> Result<Vec<i64>, OdooError> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_i64().ok_or_else(|| unexpected(method, "a list of ids", item)))
            .collect(),
        other => Err(unexpected(method, "a list of ids", &other)),
    }
}
