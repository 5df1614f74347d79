//! Wire types for the Tapakila backend API.
//!
//! The backend speaks camelCase JSON. These are the canonical response shapes;
//! anything that fails to deserialize into them is reported as
//! `ApiError::InvalidResponse` rather than guessed at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub organizer_name: Option<String>,
}

/// A ticket type sold for an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    pub event_id: i64,
    /// Ticket tier (standard, vip, premium, ...)
    #[serde(rename = "type")]
    pub ticket_type: String,
    pub price: f64,
    pub available_quantity: u32,
    /// Maximum quantity a single reservation may hold, when the backend caps it
    #[serde(default)]
    pub purchase_limit: Option<u32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Ticket {
    /// Largest quantity a single checkout may request for this ticket.
    pub fn max_quantity(&self) -> u32 {
        match self.purchase_limit {
            Some(limit) => limit.min(self.available_quantity),
            None => self.available_quantity,
        }
    }
}

/// Lifecycle state of a reservation. Transitions are backend-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

/// A reservation created by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: i64,
    pub event_id: i64,
    pub ticket_id: i64,
    pub quantity: u32,
    #[serde(default)]
    pub payment_method: Option<String>,
    pub status: ReservationStatus,
    #[serde(default)]
    pub amount: Option<f64>,
}

/// Body for `POST /api/reservations`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub event_id: i64,
    pub ticket_id: i64,
    pub quantity: u32,
    pub payment_method: PaymentMethod,
}

/// How a reservation is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    MobileMoney,
    BankTransfer,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentMethod::Card => "card",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::BankTransfer => "bank_transfer",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a successful payment, as returned by the backend.
///
/// Opaque beyond what is needed to show the user a confirmation: the
/// reference and QR code URL come straight from the receipt the backend
/// generates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    #[serde(default)]
    pub reservation_id: Option<i64>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub qr_code_url: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

/// Search filters for the public event listing.
///
/// `status` is always forced to `published` by the client; the other fields
/// are only serialized when set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Zero-based `[start, end]` slice of the event listing, serialized as a JSON
/// array in the `range` query parameter.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageRange(pub u32, pub u32);

impl Default for PageRange {
    fn default() -> Self {
        PageRange(0, 8)
    }
}

/// One page of the event listing, with the total from `X-Total-Count`.
#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub total: u64,
}

/// Body for `POST /api/auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body for `POST /api/auth/signup`.
#[derive(Debug, Serialize)]
pub struct SignupRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Response from both auth endpoints.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_max_quantity_is_min_of_limit_and_stock() {
        let mut ticket = Ticket {
            id: 10,
            event_id: 1,
            ticket_type: "standard".into(),
            price: 25.0,
            available_quantity: 5,
            purchase_limit: Some(4),
            is_active: true,
        };
        assert_eq!(ticket.max_quantity(), 4);

        ticket.purchase_limit = Some(20);
        assert_eq!(ticket.max_quantity(), 5);

        ticket.purchase_limit = None;
        assert_eq!(ticket.max_quantity(), 5);
    }

    #[test]
    fn reservation_deserializes_camel_case() {
        let json = r#"{
            "id": 55,
            "eventId": 1,
            "ticketId": 10,
            "quantity": 2,
            "paymentMethod": "card",
            "status": "pending"
        }"#;
        let reservation: Reservation = serde_json::from_str(json).unwrap();
        assert_eq!(reservation.id, 55);
        assert_eq!(reservation.event_id, 1);
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert!(reservation.amount.is_none());
    }

    #[test]
    fn reservation_request_serializes_camel_case() {
        let request = ReservationRequest {
            event_id: 1,
            ticket_id: 10,
            quantity: 2,
            payment_method: PaymentMethod::MobileMoney,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["eventId"], 1);
        assert_eq!(value["ticketId"], 10);
        assert_eq!(value["paymentMethod"], "mobile_money");
    }

    #[test]
    fn filter_skips_unset_fields() {
        let filter = EventFilter {
            search: Some("jazz".into()),
            status: Some("published".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&filter).unwrap();
        assert!(json.contains("jazz"));
        assert!(!json.contains("location"));
        assert!(!json.contains("category"));
    }

    #[test]
    fn page_range_is_a_json_array() {
        let range = PageRange::default();
        assert_eq!(serde_json::to_string(&range).unwrap(), "[0,8]");
    }
}
