//! Booking lifecycle guards.
//!
//! ```text
//! confirmed ──check_in──▶ checked_in ──check_out──▶ checked_out
//!     │
//!     ├──cancel──▶ cancelled
//!     └──no_show─▶ cancelled (+ no_show)
//! ```
//!
//! Each guard reads the current booking and either rejects the transition or
//! says what to record. Cancel and no-show detect their own completed outcome
//! so a client replaying the call gets success back.

use std::fmt;

use crate::engine::EngineError;
use crate::kyc::KycStatus;
use crate::model::{Booking, BookingPatch, BookingStatus, Day};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CheckIn,
    CheckOut,
    Cancel,
    NoShow,
    Edit,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::CheckIn => "check_in",
            Transition::CheckOut => "check_out",
            Transition::Cancel => "cancel",
            Transition::NoShow => "no_show",
            Transition::Edit => "edit",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// Replay: the booking was already cancelled. Nothing changed.
    AlreadyCancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoShowOutcome {
    Marked,
    /// Replay: the booking was already marked no-show. Nothing changed.
    AlreadyMarked,
}

impl CancelOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelOutcome::Cancelled => "cancelled",
            CancelOutcome::AlreadyCancelled => "already_cancelled",
        }
    }
}

impl NoShowOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoShowOutcome::Marked => "marked",
            NoShowOutcome::AlreadyMarked => "already_marked",
        }
    }
}

fn invalid(booking: &Booking, transition: Transition) -> EngineError {
    EngineError::InvalidTransition {
        id: booking.id,
        from: booking.status,
        transition,
    }
}

pub fn check_in(booking: &Booking) -> Result<(), EngineError> {
    if !booking.status.is_awaiting_arrival() {
        return Err(invalid(booking, Transition::CheckIn));
    }
    if booking.kyc.status != KycStatus::Verified {
        return Err(EngineError::KycNotVerified {
            id: booking.id,
            status: booking.kyc.status,
        });
    }
    Ok(())
}

pub fn check_out(booking: &Booking) -> Result<(), EngineError> {
    if booking.status != BookingStatus::CheckedIn {
        return Err(invalid(booking, Transition::CheckOut));
    }
    Ok(())
}

/// Once occupancy has begun the stay is history; only an unstarted booking cancels.
pub fn cancel(booking: &Booking) -> Result<CancelOutcome, EngineError> {
    match booking.status {
        BookingStatus::Cancelled => Ok(CancelOutcome::AlreadyCancelled),
        BookingStatus::Confirmed | BookingStatus::Active => Ok(CancelOutcome::Cancelled),
        BookingStatus::CheckedIn | BookingStatus::CheckedOut => {
            Err(invalid(booking, Transition::Cancel))
        }
    }
}

/// Time-gated: the guest keeps the dates until the arrival day has come.
pub fn no_show(booking: &Booking, today: Day) -> Result<NoShowOutcome, EngineError> {
    if booking.no_show && booking.status == BookingStatus::Cancelled {
        return Ok(NoShowOutcome::AlreadyMarked);
    }
    if !booking.status.is_awaiting_arrival() {
        return Err(invalid(booking, Transition::NoShow));
    }
    if today < booking.check_in {
        return Err(EngineError::TooEarly {
            id: booking.id,
            check_in: booking.check_in,
            today,
        });
    }
    Ok(NoShowOutcome::Marked)
}

/// A checked-out stay cannot be reopened or cancelled through an edit, and
/// an edit into `checked_in` needs the same verified identity as a check-in.
pub fn edit(booking: &Booking, patch: &BookingPatch) -> Result<(), EngineError> {
    let Some(to) = patch.status else {
        return Ok(());
    };
    if booking.status == BookingStatus::CheckedOut
        && matches!(
            to,
            BookingStatus::Confirmed | BookingStatus::Active | BookingStatus::Cancelled
        )
    {
        return Err(invalid(booking, Transition::Edit));
    }
    if to == BookingStatus::CheckedIn
        && booking.status != BookingStatus::CheckedIn
        && booking.kyc.status != KycStatus::Verified
    {
        return Err(EngineError::KycNotVerified {
            id: booking.id,
            status: booking.kyc.status,
        });
    }
    Ok(())
}

/// Status after the patch is applied.
pub fn status_after(booking: &Booking, patch: &BookingPatch) -> BookingStatus {
    patch.status.unwrap_or(booking.status)
}

/// Dates after the patch is applied.
pub fn dates_after(booking: &Booking, patch: &BookingPatch) -> (Day, Day) {
    (
        patch.check_in.unwrap_or(booking.check_in),
        patch.check_out.unwrap_or(booking.check_out),
    )
}

/// Whether the edit claims calendar days the booking does not already hold.
pub fn edit_claims_days(booking: &Booking, patch: &BookingPatch) -> bool {
    if !status_after(booking, patch).is_occupying() {
        return false;
    }
    if !booking.status.is_occupying() {
        return true;
    }
    dates_after(booking, patch) != (booking.check_in, booking.check_out)
}
