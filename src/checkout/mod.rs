//! Checkout orchestration: turn a ticket selection into a paid, confirmed
//! reservation, or fail cleanly with no dangling pending reservation.
//!
//! The flow is a small state machine:
//!
//! ```text
//! IDLE -> VALIDATING -> RESERVING -> PAYING -> [SUCCEEDED]
//!                  \-> [FAILED: validation]
//!    RESERVING --fail--> [FAILED: reservation]
//!    PAYING --fail--> CANCELLING -> [FAILED: payment]
//!    CANCELLING --fail--> [FAILED: payment+cancellation]
//! ```
//!
//! Every payment failure is followed by exactly one cancellation attempt,
//! synchronously awaited, whatever its outcome. Nothing is retried. Two
//! invocations with the same selection create two independent reservations;
//! dedup belongs to the backend.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{
    ApiError, PaymentMethod, PaymentResult, Reservation, ReservationGateway, ReservationRequest,
    Ticket,
};
use crate::session::{decode_expiry, SessionStore};

/// What the customer picked on the event page. Ephemeral; only validated once
/// checkout starts.
#[derive(Debug, Clone, Copy)]
pub struct TicketSelection {
    pub event_id: i64,
    pub ticket_id: i64,
    pub quantity: u32,
}

impl TicketSelection {
    /// Bounds check against the ticket actually on sale: at least one, at
    /// most `min(purchase_limit, available_quantity)`.
    fn validate(&self, ticket: &Ticket) -> Result<(), CheckoutError> {
        if self.quantity < 1 {
            return Err(CheckoutError::InvalidSelection(
                "quantity must be at least 1".to_string(),
            ));
        }
        let max = ticket.max_quantity();
        if self.quantity > max {
            return Err(CheckoutError::InvalidSelection(format!(
                "quantity {} exceeds the {} available for this ticket",
                self.quantity, max
            )));
        }
        Ok(())
    }
}

/// Phases of a checkout run. Terminal states are `Succeeded` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    Validating,
    Reserving,
    Paying,
    Cancelling,
    Succeeded,
    Failed,
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckoutState::Idle => "idle",
            CheckoutState::Validating => "validating",
            CheckoutState::Reserving => "reserving",
            CheckoutState::Paying => "paying",
            CheckoutState::Cancelling => "cancelling",
            CheckoutState::Succeeded => "succeeded",
            CheckoutState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The selection failed local validation; no network call was made.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// The session was missing or its token expired; no network call was
    /// made and the session store was cleared.
    #[error("session expired, please log in again")]
    SessionExpired,

    /// Reserving failed; nothing was created, so nothing to compensate.
    #[error("reservation failed: {source}")]
    ReservationFailed {
        #[source]
        source: ApiError,
    },

    /// Payment failed and the reservation was cancelled.
    #[error("payment failed: {source} (reservation {reservation_id} was cancelled)")]
    PaymentFailed {
        reservation_id: i64,
        #[source]
        source: ApiError,
    },

    /// Payment failed and the compensating cancellation failed too. The
    /// reservation may still be pending on the backend; the user should
    /// contact support rather than retry blindly.
    #[error(
        "payment failed ({payment}) and cancelling reservation {reservation_id} also failed \
         ({cancellation}); please contact support"
    )]
    PaymentAndCancellationFailed {
        reservation_id: i64,
        payment: ApiError,
        cancellation: ApiError,
    },
}

/// Terminal success: the reservation from RESERVING plus the payment receipt.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub reservation: Reservation,
    pub payment: PaymentResult,
}

impl CheckoutOutcome {
    /// Something the user can navigate to or quote to support.
    pub fn confirmation_reference(&self) -> String {
        self.payment
            .reference
            .clone()
            .unwrap_or_else(|| format!("reservation-{}", self.reservation.id))
    }
}

/// Drives reserve -> pay with compensating cancellation.
///
/// Reads the session store during validation; mutates it only by logging out
/// when the backend rejects the credentials. Each call runs independently;
/// concurrent checkouts are not coordinated here.
pub struct CheckoutOrchestrator {
    gateway: Arc<dyn ReservationGateway>,
    session: Arc<SessionStore>,
}

impl CheckoutOrchestrator {
    pub fn new(gateway: Arc<dyn ReservationGateway>, session: Arc<SessionStore>) -> Self {
        Self { gateway, session }
    }

    /// Run one checkout to a terminal state.
    ///
    /// `ticket` is the ticket the selection refers to, as already fetched for
    /// display; validation never makes its own network calls.
    pub async fn checkout(
        &self,
        selection: &TicketSelection,
        ticket: &Ticket,
        payment_method: PaymentMethod,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        // VALIDATING: re-decode expiry from the raw token at the instant of
        // the call; the cached claims are display-only.
        info!(state = %CheckoutState::Validating, event_id = selection.event_id, "Starting checkout");
        let session = self.session.current().ok_or(CheckoutError::SessionExpired)?;
        match decode_expiry(&session.raw_token) {
            Ok(exp) if exp > Utc::now().timestamp() => {}
            _ => {
                warn!("Session token expired or undecodable, logging out");
                self.session.logout();
                return Err(CheckoutError::SessionExpired);
            }
        }
        selection.validate(ticket)?;

        // RESERVING
        info!(state = %CheckoutState::Reserving, ticket_id = selection.ticket_id, quantity = selection.quantity, "Creating reservation");
        let request = ReservationRequest {
            event_id: selection.event_id,
            ticket_id: selection.ticket_id,
            quantity: selection.quantity,
            payment_method,
        };
        let reservation = match self.gateway.create_reservation(&request).await {
            Ok(reservation) => reservation,
            Err(e) => {
                if e.is_auth_error() {
                    warn!(error = %e, "Backend rejected credentials, logging out");
                    self.session.logout();
                }
                info!(state = %CheckoutState::Failed, "Checkout failed while reserving");
                return Err(CheckoutError::ReservationFailed { source: e });
            }
        };

        // PAYING
        info!(state = %CheckoutState::Paying, reservation_id = reservation.id, "Paying reservation");
        match self.gateway.pay_reservation(reservation.id, payment_method).await {
            Ok(payment) => {
                info!(state = %CheckoutState::Succeeded, reservation_id = reservation.id, "Checkout complete");
                Ok(CheckoutOutcome {
                    reservation,
                    payment,
                })
            }
            Err(payment_err) => {
                // CANCELLING: exactly one attempt, awaited before reporting.
                warn!(state = %CheckoutState::Cancelling, reservation_id = reservation.id, error = %payment_err, "Payment failed, cancelling reservation");
                match self.gateway.cancel_reservation(reservation.id).await {
                    Ok(()) => {
                        info!(state = %CheckoutState::Failed, reservation_id = reservation.id, "Reservation cancelled after payment failure");
                        Err(CheckoutError::PaymentFailed {
                            reservation_id: reservation.id,
                            source: payment_err,
                        })
                    }
                    Err(cancel_err) => {
                        warn!(state = %CheckoutState::Failed, reservation_id = reservation.id, error = %cancel_err, "Compensating cancellation failed");
                        Err(CheckoutError::PaymentAndCancellationFailed {
                            reservation_id: reservation.id,
                            payment: payment_err,
                            cancellation: cancel_err,
                        })
                    }
                }
            }
        }
    }
}
