//! Service clients.
//!
//! One [`ServiceClient`] per backend, all built by the same
//! [`ApiClientFactory`] so they share timeout, default headers and
//! interceptors. [`ApiClientSet::set_token`] is the only way to change the
//! shared `Authorization` default.

use crate::config::ConsoleConfig;
use crate::error::{
    ApiError, ApiErrorKind, ApiResult, normalize_decode, normalize_response, normalize_transport,
};
use crate::interceptor::{AuthEvents, AuthInterceptor, RequestInterceptor, ResponseInterceptor};
use crate::navigation::Navigator;
use crate::request::{HttpClient, HttpRequest, HttpResponse};
use crate::storage::KeyValueStore;
use apiary_shared::protocol::{ApiRequest, BodyEncoding, HttpMethod};
use apiary_shared::{
    CONTENT_TYPE_FORM, CONTENT_TYPE_JSON, HEADER_ACCEPT, HEADER_AUTHORIZATION,
    HEADER_CONTENT_TYPE, HEALTH_PATH, HealthStatus, Service, bearer,
};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error, warn};

// =========================================================
// Body encoding
// =========================================================

fn encode_json<T: Serialize>(body: &T) -> ApiResult<String> {
    serde_json::to_string(body)
        .map_err(|e| ApiError::new(ApiErrorKind::Encode, format!("failed to encode request: {e}")))
}

/// Flattens a struct into `application/x-www-form-urlencoded`.
fn encode_form<T: Serialize>(body: &T) -> ApiResult<String> {
    let value = serde_json::to_value(body)
        .map_err(|e| ApiError::new(ApiErrorKind::Encode, format!("failed to encode request: {e}")))?;
    let Value::Object(fields) = value else {
        return Err(ApiError::new(
            ApiErrorKind::Encode,
            "form bodies must be objects",
        ));
    };

    let mut form = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &fields {
        match value {
            Value::Null => {}
            Value::String(s) => {
                form.append_pair(key, s);
            }
            other => {
                form.append_pair(key, &other.to_string());
            }
        }
    }
    Ok(form.finish())
}

// =========================================================
// ServiceClient
// =========================================================

pub struct ServiceClient {
    service: Service,
    base_url: String,
    timeout: Duration,
    default_headers: RefCell<HashMap<String, String>>,
    transport: Rc<dyn HttpClient>,
    request_interceptors: Vec<Rc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Rc<dyn ResponseInterceptor>>,
}

impl ServiceClient {
    pub fn service(&self) -> Service {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn default_header(&self, name: &str) -> Option<String> {
        self.default_headers
            .borrow()
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    /// The shared `Authorization` default, if any.
    pub fn authorization(&self) -> Option<String> {
        self.default_header(HEADER_AUTHORIZATION)
    }

    /// Only [`ApiClientSet::set_token`] may call this.
    fn set_authorization(&self, token: Option<&str>) {
        let mut headers = self.default_headers.borrow_mut();
        match token {
            Some(token) => {
                headers.insert(HEADER_AUTHORIZATION.to_string(), bearer(token));
            }
            None => {
                headers.remove(HEADER_AUTHORIZATION);
            }
        }
    }

    /// Sends a raw request through defaults, interceptors and the transport.
    ///
    /// Non-2xx responses and transport failures come back normalized, after
    /// every response interceptor has seen them.
    pub async fn execute(&self, mut req: HttpRequest) -> ApiResult<HttpResponse> {
        for (k, v) in self.default_headers.borrow().iter() {
            if req.header(k).is_none() {
                req.headers.insert(k.clone(), v.clone());
            }
        }
        if req.timeout.is_none() {
            req.timeout = Some(self.timeout);
        }
        for interceptor in &self.request_interceptors {
            interceptor.before_send(&mut req);
        }

        let method = req.method;
        let url = req.url.clone();
        debug!(service = %self.service, %method, %url, "dispatching request");

        let err = match self.transport.send(req).await {
            Ok(resp) if resp.is_success() => {
                debug!(service = %self.service, %method, %url, status = resp.status, "response received");
                return Ok(resp);
            }
            Ok(resp) => normalize_response(&resp),
            Err(e) => normalize_transport(&e),
        };

        warn!(
            service = %self.service,
            %method,
            %url,
            status = ?err.status,
            code = err.code(),
            message = %err.message,
            "request failed"
        );
        for interceptor in &self.response_interceptors {
            interceptor.on_error(&err);
        }
        Err(err)
    }

    /// Sends a typed request and decodes its response.
    pub async fn send<R: ApiRequest>(&self, request: &R) -> ApiResult<R::Response> {
        let mut req = HttpRequest::new(&self.url(&request.path()), R::METHOD);
        for (key, value) in request.query() {
            req = req.with_query(key, &value);
        }
        if R::METHOD.has_body() {
            req = match R::ENCODING {
                BodyEncoding::Json => req.with_body(encode_json(request)?),
                BodyEncoding::Form => req
                    .with_header(HEADER_CONTENT_TYPE, CONTENT_TYPE_FORM)
                    .with_body(encode_form(request)?),
            };
        }

        let resp = self.execute(req).await?;
        resp.json::<R::Response>().map_err(|e| {
            let err = normalize_decode(&resp, &e);
            error!(service = %self.service, path = %request.path(), error = %e, "unexpected response shape");
            err
        })
    }
}

// =========================================================
// ApiClientFactory
// =========================================================

/// Builds service clients with shared defaults.
pub struct ApiClientFactory {
    transport: Rc<dyn HttpClient>,
    timeout: Duration,
    request_interceptors: Vec<Rc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Rc<dyn ResponseInterceptor>>,
}

impl ApiClientFactory {
    pub fn new(transport: Rc<dyn HttpClient>, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    pub fn with_request_interceptor(mut self, interceptor: Rc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    pub fn with_response_interceptor(mut self, interceptor: Rc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    pub fn create(&self, service: Service, base_url: &str) -> ServiceClient {
        let default_headers = HashMap::from([
            (HEADER_CONTENT_TYPE.to_string(), CONTENT_TYPE_JSON.to_string()),
            (HEADER_ACCEPT.to_string(), CONTENT_TYPE_JSON.to_string()),
        ]);
        ServiceClient {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: self.timeout,
            default_headers: RefCell::new(default_headers),
            transport: self.transport.clone(),
            request_interceptors: self.request_interceptors.clone(),
            response_interceptors: self.response_interceptors.clone(),
        }
    }
}

// =========================================================
// ApiClientSet
// =========================================================

/// Outcome of one `/health` probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceHealth {
    pub service: Service,
    pub healthy: bool,
    pub detail: String,
}

/// One client per backend service, visited in [`Service::ALL`] order.
pub struct ApiClientSet {
    auth: ServiceClient,
    hive: ServiceClient,
    monitoring: ServiceClient,
    notification: ServiceClient,
    events: Rc<AuthEvents>,
}

impl ApiClientSet {
    /// Wires the auth interceptor into a factory and builds every client.
    pub fn new(
        config: &ConsoleConfig,
        transport: Rc<dyn HttpClient>,
        storage: Rc<dyn KeyValueStore>,
        navigator: Rc<dyn Navigator>,
    ) -> Self {
        let events = Rc::new(AuthEvents::new());
        let auth = Rc::new(AuthInterceptor::new(
            storage,
            navigator,
            events.clone(),
            &config.token_key,
        ));
        let factory = ApiClientFactory::new(transport, config.timeout)
            .with_request_interceptor(auth.clone())
            .with_response_interceptor(auth);

        Self {
            auth: factory.create(Service::Auth, config.base_url(Service::Auth)),
            hive: factory.create(Service::Hive, config.base_url(Service::Hive)),
            monitoring: factory.create(Service::Monitoring, config.base_url(Service::Monitoring)),
            notification: factory.create(
                Service::Notification,
                config.base_url(Service::Notification),
            ),
            events,
        }
    }

    pub fn client(&self, service: Service) -> &ServiceClient {
        match service {
            Service::Auth => &self.auth,
            Service::Hive => &self.hive,
            Service::Monitoring => &self.monitoring,
            Service::Notification => &self.notification,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceClient> {
        Service::ALL.into_iter().map(|service| self.client(service))
    }

    /// Hook for reacting to a 401 from any client.
    pub fn events(&self) -> &Rc<AuthEvents> {
        &self.events
    }

    /// Sets or clears the shared bearer token on every client.
    ///
    /// Visits all clients before returning; nothing can run in between on
    /// the single-threaded loop, so no caller sees clients disagree.
    pub fn set_token(&self, token: Option<&str>) {
        for client in self.iter() {
            client.set_authorization(token);
        }
        debug!(present = token.is_some(), "propagated token to all clients");
    }

    /// The `Authorization` default of every client, in visiting order.
    pub fn authorization_headers(&self) -> Vec<Option<String>> {
        self.iter().map(ServiceClient::authorization).collect()
    }

    /// Routes a typed request to the client of its service.
    pub async fn call<R: ApiRequest>(&self, request: &R) -> ApiResult<R::Response> {
        self.client(R::SERVICE).send(request).await
    }

    /// Probes `GET /health` on every service concurrently.
    pub async fn check_health(&self) -> Vec<ServiceHealth> {
        let probes = self.iter().map(|client| async move {
            let req = HttpRequest::new(&client.url(HEALTH_PATH), HttpMethod::Get);
            let outcome = match client.execute(req).await {
                Ok(resp) => resp
                    .json::<HealthStatus>()
                    .map(|h| h.status)
                    .map_err(|e| normalize_decode(&resp, &e)),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(status) => ServiceHealth {
                    service: client.service(),
                    healthy: true,
                    detail: status,
                },
                Err(e) => ServiceHealth {
                    service: client.service(),
                    healthy: false,
                    detail: e.message,
                },
            }
        });
        futures::future::join_all(probes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::MemoryNavigator;
    use crate::request::{MockHttpClient, TransportError};
    use crate::storage::MemoryStorage;
    use apiary_shared::protocol::{CurrentUser, ListAlerts, ListHives};
    use apiary_shared::{AlertFilter, TokenRequest};
    use serde_json::json;

    struct Fixture {
        http: Rc<MockHttpClient>,
        storage: Rc<MemoryStorage>,
        navigator: Rc<MemoryNavigator>,
        clients: ApiClientSet,
    }

    fn fixture(path: &str) -> Fixture {
        let http = Rc::new(MockHttpClient::new());
        let storage = Rc::new(MemoryStorage::new());
        let navigator = Rc::new(MemoryNavigator::new(path));
        let config = ConsoleConfig::default().with_single_origin("http://api.test");
        let clients = ApiClientSet::new(&config, http.clone(), storage.clone(), navigator.clone());
        Fixture {
            http,
            storage,
            navigator,
            clients,
        }
    }

    #[test]
    fn set_token_reaches_every_client() {
        let f = fixture("/");
        assert_eq!(f.clients.authorization_headers(), vec![None; 4]);

        for token in [Some("abc"), Some("def"), None, Some("ghi"), None] {
            f.clients.set_token(token);
            let expected = token.map(bearer);
            assert!(
                f.clients
                    .authorization_headers()
                    .iter()
                    .all(|h| *h == expected)
            );
        }
    }

    #[test]
    fn set_then_clear_leaves_no_authorization() {
        let f = fixture("/");
        f.clients.set_token(Some("abc"));
        f.clients.set_token(None);
        for client in f.clients.iter() {
            assert_eq!(client.authorization(), None);
            assert_eq!(client.default_header(HEADER_CONTENT_TYPE).as_deref(), Some(CONTENT_TYPE_JSON));
        }
    }

    #[tokio::test]
    async fn request_hook_reads_the_token_at_dispatch_time() {
        let f = fixture("/");
        f.http.mock_response(HttpMethod::Get, "http://api.test/hives/", 200, json!([]));

        f.clients.call(&ListHives).await.unwrap();
        let first = f.http.last_request().unwrap();
        assert_eq!(first.header(HEADER_AUTHORIZATION), None);
        assert_eq!(first.timeout, Some(Duration::from_secs(15)));

        f.storage.set("token", "fresh");
        f.clients.call(&ListHives).await.unwrap();
        let second = f.http.last_request().unwrap();
        assert_eq!(second.header(HEADER_AUTHORIZATION), Some("Bearer fresh"));
    }

    #[tokio::test]
    async fn token_request_is_form_encoded() {
        let f = fixture("/login");
        f.http.mock_response(
            HttpMethod::Post,
            "http://api.test/token",
            200,
            json!({ "access_token": "abc", "token_type": "bearer" }),
        );

        let resp = f
            .clients
            .call(&TokenRequest {
                username: "keeper@example.com".into(),
                password: "p&ss word".into(),
            })
            .await
            .unwrap();
        assert_eq!(resp.access_token.as_deref(), Some("abc"));

        let req = f.http.last_request().unwrap();
        assert_eq!(req.header(HEADER_CONTENT_TYPE), Some(CONTENT_TYPE_FORM));
        let body = req.body.unwrap();
        assert!(body.contains("username=keeper%40example.com"));
        assert!(body.contains("password=p%26ss+word"));
    }

    #[tokio::test]
    async fn query_parameters_are_forwarded() {
        let f = fixture("/");
        f.http.mock_response(HttpMethod::Get, "http://api.test/alerts/", 200, json!([]));

        f.clients
            .call(&ListAlerts {
                filter: AlertFilter {
                    hive_id: Some(4),
                    sensor_id: None,
                },
            })
            .await
            .unwrap();
        let req = f.http.last_request().unwrap();
        assert_eq!(req.query, vec![("hive_id".to_string(), "4".to_string())]);
        assert!(req.body.is_none());
    }

    #[tokio::test]
    async fn unauthorized_from_any_service_clears_the_token() {
        let f = fixture("/hives");
        f.storage.set("token", "stale");
        f.clients.set_token(Some("stale"));
        f.http.mock_response(
            HttpMethod::Get,
            "http://api.test/hives/",
            401,
            json!({ "detail": "Could not validate credentials" }),
        );

        let err = f.clients.call(&ListHives).await.unwrap_err();
        assert_eq!(err.status, Some(401));
        assert_eq!(err.message, "Could not validate credentials");
        assert_eq!(f.storage.get("token"), None);
        assert_eq!(f.navigator.current_path(), "/login");
    }

    #[tokio::test]
    async fn network_failures_are_distinguishable() {
        let f = fixture("/");
        f.storage.set("token", "abc");
        f.http.mock_failure(
            HttpMethod::Get,
            "http://api.test/users/me",
            TransportError::Network("connection refused".into()),
        );

        let err = f.clients.call(&CurrentUser).await.unwrap_err();
        assert!(err.is_network_error());
        assert_eq!(err.status, None);
        assert_eq!(err.code(), "ERR_NETWORK");
        assert_eq!(f.storage.get("token").as_deref(), Some("abc"));
        assert_eq!(f.navigator.history(), vec!["/"]);
    }

    #[tokio::test]
    async fn unexpected_shapes_become_decode_errors() {
        let f = fixture("/");
        f.http.mock_response(HttpMethod::Get, "http://api.test/hives/", 200, json!({ "oops": true }));

        let err = f.clients.call(&ListHives).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Decode);
        assert_eq!(err.status, Some(200));
    }

    #[tokio::test]
    async fn health_reports_every_service() {
        let f = fixture("/");
        f.http.mock_response(
            HttpMethod::Get,
            "http://api.test/health",
            200,
            json!({ "status": "healthy", "service": "auth" }),
        );

        let report = f.clients.check_health().await;
        assert_eq!(report.len(), 4);
        assert!(report.iter().all(|h| h.healthy && h.detail == "healthy"));
        assert_eq!(
            report.iter().map(|h| h.service).collect::<Vec<_>>(),
            Service::ALL.to_vec()
        );
    }
}
