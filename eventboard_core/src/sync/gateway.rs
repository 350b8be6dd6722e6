use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::data::{Category, Event, EventDraft, EventId, NewsletterSignup, Registration};

/// The resources exposed by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Events,
    Event(EventId),
    Categories,
    Registrations,
    Newsletter,
}

impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Endpoint::Events => "/events".to_string(),
            Endpoint::Event(id) => format!("/events/{id}"),
            Endpoint::Categories => "/categories".to_string(),
            Endpoint::Registrations => "/registrations".to_string(),
            Endpoint::Newsletter => "/newsletter".to_string(),
        }
    }
}

/// Why a single request against the resource API failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No response was obtained at all.
    #[error("unable to reach the server: {0}")]
    Network(String),
    /// The server answered with a non-success status. The body is not
    /// interpreted.
    #[error("{status} {status_text}")]
    Status { status: u16, status_text: String },
    /// The server answered successfully, but not with the expected shape.
    #[error("unexpected response body: {0}")]
    Parse(String),
}

impl GatewayError {
    pub fn status(code: u16) -> Self {
        let status_text = StatusCode::from_u16(code)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or_default()
            .to_string();
        GatewayError::Status { status: code, status_text }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Status { status: 404, .. })
    }

    fn missing_body(endpoint: &Endpoint) -> Self {
        GatewayError::Parse(format!("expected a response body from {}", endpoint.path()))
    }
}

/// Defines the requests a client can make against the resource API.
pub trait ResourceApi {
    /// Downloads every event, in the server's order.
    async fn list_events(&self) -> Result<Vec<Event>, GatewayError>;

    async fn fetch_event(&self, id: EventId) -> Result<Event, GatewayError>;

    /// Asks the server to store a new event. Returns the canonical record,
    /// including the ID the server assigned.
    async fn create_event(&self, draft: &EventDraft) -> Result<Event, GatewayError>;

    /// Replaces the event with the given ID by `event`. Returns the record as
    /// the server stored it.
    async fn update_event(&self, id: EventId, event: &Event) -> Result<Event, GatewayError>;

    async fn delete_event(&self, id: EventId) -> Result<(), GatewayError>;

    async fn list_categories(&self) -> Result<Vec<Category>, GatewayError>;

    async fn register_interest(&self, registration: &Registration) -> Result<(), GatewayError>;

    async fn subscribe_newsletter(&self, signup: &NewsletterSignup) -> Result<(), GatewayError>;
}

/// Talks to the resource API over HTTP with JSON bodies. Every call is a
/// single attempt; retrying is up to the caller.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Sends one request and decodes the response as `R`. Returns `None` for
    /// a 204 No Content response.
    pub async fn call<B, R>(
        &self,
        method: Method,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<Option<R>, GatewayError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let Some(text) = self.dispatch(method, endpoint, body).await? else {
            return Ok(None);
        };
        serde_json::from_str(&text).map(Some).map_err(|e| GatewayError::Parse(e.to_string()))
    }

    /// Like [`HttpGateway::call`], but requires a body in the response.
    async fn call_for<B, R>(
        &self,
        method: Method,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<R, GatewayError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.call(method, endpoint, body).await?.ok_or_else(|| GatewayError::missing_body(endpoint))
    }

    /// Sends the request and returns the raw response body, or `None` for a
    /// 204 No Content response.
    async fn dispatch<B>(
        &self,
        method: Method,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<Option<String>, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.config.url_for(endpoint);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| GatewayError::Network(e.to_string()))?;
        let status = response.status();
        tracing::debug!("{method} {url}: status={status}");

        if !status.is_success() {
            return Err(GatewayError::status(status.as_u16()));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = response.text().await.map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Some(text))
    }
}

impl ResourceApi for HttpGateway {
    async fn list_events(&self) -> Result<Vec<Event>, GatewayError> {
        self.call_for::<(), _>(Method::GET, &Endpoint::Events, None).await
    }

    async fn fetch_event(&self, id: EventId) -> Result<Event, GatewayError> {
        self.call_for::<(), _>(Method::GET, &Endpoint::Event(id), None).await
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<Event, GatewayError> {
        self.call_for(Method::POST, &Endpoint::Events, Some(draft)).await
    }

    async fn update_event(&self, id: EventId, event: &Event) -> Result<Event, GatewayError> {
        self.call_for(Method::PUT, &Endpoint::Event(id), Some(event)).await
    }

    async fn delete_event(&self, id: EventId) -> Result<(), GatewayError> {
        self.dispatch::<()>(Method::DELETE, &Endpoint::Event(id), None).await.map(drop)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, GatewayError> {
        self.call_for::<(), _>(Method::GET, &Endpoint::Categories, None).await
    }

    async fn register_interest(&self, registration: &Registration) -> Result<(), GatewayError> {
        self.dispatch(Method::POST, &Endpoint::Registrations, Some(registration)).await.map(drop)
    }

    async fn subscribe_newsletter(&self, signup: &NewsletterSignup) -> Result<(), GatewayError> {
        self.dispatch(Method::POST, &Endpoint::Newsletter, Some(signup)).await.map(drop)
    }
}

#[cfg(test)]
mod test {
    use httpmock::Method::{DELETE, GET, POST, PUT};
    use httpmock::MockServer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::data::CategoryId;

    fn gateway(server: &MockServer) -> HttpGateway {
        HttpGateway::new(GatewayConfig::new(server.base_url()).unwrap()).unwrap()
    }

    fn event_json(id: u64, title: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "description": "",
            "image": "",
            "location": "",
            "startTime": "2023-03-10T18:00:00.000Z",
            "endTime": "2023-03-10T21:00:00.000Z",
            "categoryIds": [10]
        })
    }

    fn draft(title: &str) -> EventDraft {
        EventDraft {
            title: title.to_string(),
            description: "desc".into(),
            image: "https://example.com/a.png".into(),
            location: "Hall".into(),
            start_time: "2023-03-10T18:00:00Z".parse().unwrap(),
            end_time: "2023-03-10T21:00:00Z".parse().unwrap(),
            category_ids: vec![CategoryId(10)],
        }
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(Endpoint::Events.path(), "/events");
        assert_eq!(Endpoint::Event(EventId(12)).path(), "/events/12");
        assert_eq!(Endpoint::Categories.path(), "/categories");
        assert_eq!(Endpoint::Registrations.path(), "/registrations");
        assert_eq!(Endpoint::Newsletter.path(), "/newsletter");
    }

    #[tokio::test]
    async fn lists_events_in_server_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/events");
                then.status(200).json_body(json!([event_json(2, "B"), event_json(1, "A")]));
            })
            .await;

        let events = gateway(&server).list_events().await.unwrap();

        mock.assert_async().await;
        assert_eq!(events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![EventId(2), EventId(1)]);
    }

    #[tokio::test]
    async fn create_sends_json_draft_without_id() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/events")
                    .header("content-type", "application/json")
                    .json_body(serde_json::to_value(draft("New")).unwrap());
                then.status(201).json_body(event_json(9, "New"));
            })
            .await;

        let created = gateway(&server).create_event(&draft("New")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(created.id, EventId(9));
        assert_eq!(created.title, "New");
    }

    #[tokio::test]
    async fn update_puts_full_record_to_its_path() {
        let server = MockServer::start_async().await;
        let full = draft("Renamed").with_id(EventId(4));
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/events/4")
                    .json_body(serde_json::to_value(&full).unwrap());
                then.status(200).json_body(event_json(4, "Renamed"));
            })
            .await;

        let updated = gateway(&server).update_event(EventId(4), &full).await.unwrap();

        mock.assert_async().await;
        assert_eq!(updated.title, "Renamed");
    }

    #[tokio::test]
    async fn update_sends_back_fields_it_does_not_edit() {
        let server = MockServer::start_async().await;
        let mut full = draft("Renamed").with_id(EventId(4));
        full.extra.insert("createdBy".into(), json!(2));
        let mut response = event_json(4, "Renamed");
        response["createdBy"] = json!(2);
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/events/4").json_body_partial(r#"{ "createdBy": 2 }"#);
                then.status(200).json_body(response);
            })
            .await;

        let updated = gateway(&server).update_event(EventId(4), &full).await.unwrap();

        mock.assert_async().await;
        assert_eq!(updated.extra.get("createdBy"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn non_success_status_becomes_status_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/events/5");
                then.status(404).body("{\"this\": \"is ignored\"}");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/categories");
                then.status(500).body("not even json");
            })
            .await;

        let gateway = gateway(&server);
        let not_found = gateway.fetch_event(EventId(5)).await.unwrap_err();
        assert_eq!(not_found, GatewayError::Status { status: 404, status_text: "Not Found".into() });
        assert!(not_found.is_not_found());
        assert_eq!(
            gateway.list_categories().await.unwrap_err(),
            GatewayError::Status { status: 500, status_text: "Internal Server Error".into() }
        );
    }

    #[tokio::test]
    async fn no_content_is_absent_not_an_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/events/3");
                then.status(204);
            })
            .await;

        let gateway = gateway(&server);
        gateway.delete_event(EventId(3)).await.unwrap();
        mock.assert_async().await;

        let body: Option<Event> =
            gateway.call::<(), _>(Method::DELETE, &Endpoint::Event(EventId(3)), None).await.unwrap();
        assert_eq!(body, None);
    }

    #[tokio::test]
    async fn delete_accepts_a_body_too() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/events/8");
                then.status(200).json_body(json!({}));
            })
            .await;

        assert_eq!(gateway(&server).delete_event(EventId(8)).await, Ok(()));
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/events");
                then.status(200).json_body(json!({ "events": [] }));
            })
            .await;

        let err = gateway(&server).list_events().await.unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn create_with_no_content_is_a_parse_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/events");
                then.status(204);
            })
            .await;

        let err = gateway(&server).create_event(&draft("New")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn submissions_ignore_the_response_body() {
        let server = MockServer::start_async().await;
        let registrations = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/registrations")
                    .json_body(json!({ "eventId": 1, "name": "Ada", "email": "ada@example.com" }));
                then.status(201).body("created");
            })
            .await;
        let newsletter = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/newsletter")
                    .json_body(json!({ "name": "Ada", "email": "ada@example.com" }));
                then.status(201);
            })
            .await;

        let gateway = gateway(&server);
        gateway
            .register_interest(&Registration {
                event_id: EventId(1),
                name: "Ada".into(),
                email: "ada@example.com".into(),
            })
            .await
            .unwrap();
        gateway
            .subscribe_newsletter(&NewsletterSignup {
                name: "Ada".into(),
                email: "ada@example.com".into(),
            })
            .await
            .unwrap();

        registrations.assert_async().await;
        newsletter.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        // nothing listens on the discard port
        let gateway = HttpGateway::new(GatewayConfig::new("http://127.0.0.1:9").unwrap()).unwrap();
        let err = gateway.list_events().await.unwrap_err();
        assert!(matches!(err, GatewayError::Network(_)), "{err:?}");
    }
}
