//! Typed client for the Tapakila backend API.
//!
//! The backend owns events, tickets, reservations, and payments; this module
//! only translates typed calls into authenticated HTTP requests and typed
//! results. See [`error::ApiError`] for the failure taxonomy.

mod client;
mod error;
mod types;

pub use client::ApiClient;
pub use error::ApiError;
pub use types::{
    AuthResponse, Event, EventFilter, EventPage, LoginRequest, PageRange, PaymentMethod,
    PaymentResult, Reservation, ReservationRequest, ReservationStatus, SignupRequest, Ticket,
};

/// The reservation operations the checkout flow depends on.
///
/// Implemented by [`ApiClient`] against the real backend; the trait seam
/// exists so the checkout orchestrator can be exercised against a mock.
#[async_trait::async_trait]
pub trait ReservationGateway: Send + Sync {
    async fn create_reservation(
        &self,
        request: &ReservationRequest,
    ) -> Result<Reservation, ApiError>;

    async fn pay_reservation(
        &self,
        reservation_id: i64,
        payment_method: PaymentMethod,
    ) -> Result<PaymentResult, ApiError>;

    async fn cancel_reservation(&self, reservation_id: i64) -> Result<(), ApiError>;
}
