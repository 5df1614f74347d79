//! HTTP client for the Tapakila backend API.
//!
//! Wraps the REST endpoints in typed async calls. Every request carries
//! `Authorization: Bearer <token>` when a session exists; every non-2xx
//! response becomes an [`ApiError::Http`] with the message the backend put in
//! its `message`/`error` field.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::session::SessionStore;

use super::error::ApiError;
use super::types::{
    AuthResponse, Event, EventFilter, EventPage, LoginRequest, PageRange, PaymentMethod,
    PaymentResult, Reservation, ReservationRequest, SignupRequest, Ticket,
};
use super::ReservationGateway;

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    session: Arc<SessionStore>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayRequest {
    payment_method: PaymentMethod,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, session: Arc<SessionStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.current() {
            Some(session) => builder.header(
                AUTHORIZATION,
                format!("Bearer {}", session.raw_token),
            ),
            None => builder,
        }
    }

    /// Send a request, turning transport failures and non-2xx statuses into
    /// the error taxonomy.
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await.map_err(ApiError::Network)?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.bytes().await.unwrap_or_default();
            Err(ApiError::Http {
                status: status.as_u16(),
                message: extract_message(status.as_u16(), &body),
            })
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.send(self.authorize(self.http.get(&url))).await?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .send(self.authorize(self.http.post(&url).json(body)))
            .await?;
        Self::decode(response).await
    }

    /// PUT with no request body; the response body, if any, is ignored.
    async fn put_empty(&self, path: &str) -> Result<(), ApiError> {
        let url = format!("{}{}", self.base_url, path);
        self.send(self.authorize(self.http.put(&url))).await?;
        Ok(())
    }

    /// List published events matching `filter`, one page at a time.
    ///
    /// The public listing only ever shows published events, so `status` is
    /// forced regardless of what the caller set. The total count comes from
    /// the `X-Total-Count` header, falling back to the page length.
    pub async fn list_events(
        &self,
        filter: &EventFilter,
        range: PageRange,
    ) -> Result<EventPage, ApiError> {
        let mut filter = filter.clone();
        filter.status = Some("published".to_string());
        let filter_json = serde_json::to_string(&filter).expect("filter is valid JSON");
        let range_json = serde_json::to_string(&range).expect("range is valid JSON");

        let url = format!("{}/api/events/filter/by-status", self.base_url);
        let request = self
            .http
            .get(&url)
            .query(&[("filter", filter_json), ("range", range_json)]);
        let response = self.send(self.authorize(request)).await?;

        let total_header = response
            .headers()
            .get("X-Total-Count")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let events: Vec<Event> = Self::decode(response).await?;
        let total = total_header.unwrap_or(events.len() as u64);

        Ok(EventPage { events, total })
    }

    /// Fetch a single event by id.
    pub async fn get_event(&self, event_id: i64) -> Result<Event, ApiError> {
        self.get_json(&format!("/api/events/{}", event_id)).await
    }

    /// List the ticket types on sale for an event.
    pub async fn get_event_tickets(&self, event_id: i64) -> Result<Vec<Ticket>, ApiError> {
        self.get_json(&format!("/api/events/{}/tickets", event_id))
            .await
    }

    /// The most recent events, for the landing view.
    pub async fn latest_events(&self) -> Result<Vec<Event>, ApiError> {
        self.get_json("/api/events/last-date").await
    }

    /// List the authenticated user's reservations.
    pub async fn my_reservations(&self) -> Result<Vec<Reservation>, ApiError> {
        self.get_json("/api/user-reservations/my-reservations")
            .await
    }

    /// Confirm a pending reservation.
    pub async fn confirm_reservation(&self, reservation_id: i64) -> Result<(), ApiError> {
        self.put_empty(&format!("/api/user-reservations/{}/confirm", reservation_id))
            .await
    }

    /// Exchange credentials for a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let response: AuthResponse = self
            .post_json("/api/auth/login", &LoginRequest { email, password })
            .await?;
        Ok(response.token)
    }

    /// Create an account and return its bearer token.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<String, ApiError> {
        let response: AuthResponse = self
            .post_json(
                "/api/auth/signup",
                &SignupRequest {
                    name,
                    email,
                    password,
                },
            )
            .await?;
        Ok(response.token)
    }
}

#[async_trait::async_trait]
impl ReservationGateway for ApiClient {
    async fn create_reservation(
        &self,
        request: &ReservationRequest,
    ) -> Result<Reservation, ApiError> {
        self.post_json("/api/reservations", request).await
    }

    async fn pay_reservation(
        &self,
        reservation_id: i64,
        payment_method: PaymentMethod,
    ) -> Result<PaymentResult, ApiError> {
        self.post_json(
            &format!("/api/reservations/{}/pay", reservation_id),
            &PayRequest { payment_method },
        )
        .await
    }

    async fn cancel_reservation(&self, reservation_id: i64) -> Result<(), ApiError> {
        self.put_empty(&format!("/api/reservations/{}/cancel", reservation_id))
            .await
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend puts it in `message` or `error`; a body that is not JSON at
/// all is treated as an empty error payload.
fn extract_message(status: u16, body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => value
            .get("message")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("error").and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status {}", status)),
        Err(_) => format!("request failed with status {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_message_field() {
        let body = br#"{"message": "Quantity exceeds purchase limit"}"#;
        assert_eq!(extract_message(400, body), "Quantity exceeds purchase limit");
    }

    #[test]
    fn falls_back_to_error_field() {
        let body = br#"{"error": "Evenement non trouve"}"#;
        assert_eq!(extract_message(404, body), "Evenement non trouve");
    }

    #[test]
    fn message_field_wins_over_error_field() {
        let body = br#"{"message": "primary", "error": "secondary"}"#;
        assert_eq!(extract_message(500, body), "primary");
    }

    #[test]
    fn unparsable_body_is_treated_as_empty() {
        assert_eq!(
            extract_message(502, b"<html>Bad Gateway</html>"),
            "request failed with status 502"
        );
        assert_eq!(extract_message(500, b""), "request failed with status 500");
    }

    #[test]
    fn json_body_without_known_fields_uses_fallback() {
        let body = br#"{"detail": "something else"}"#;
        assert_eq!(extract_message(422, body), "request failed with status 422");
    }
}
