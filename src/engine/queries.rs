use ulid::Ulid;

use crate::auth::Authorization;
use crate::model::*;

use super::availability;
use super::conflict::{validate_stay, validate_window};
use super::{Engine, EngineError};

impl Engine {
    /// `Ok` when the stay is free, `Unavailable` with the first conflict otherwise.
    /// The answer may be stale by the time the caller acts on it.
    pub async fn check_availability(
        &self,
        auth: &Authorization,
        check_in: Day,
        check_out: Day,
        exclude: Option<Ulid>,
    ) -> Result<(), EngineError> {
        auth.operator()?;
        let span = validate_stay(check_in, check_out)?;
        let guard = self.calendar.read().await;
        availability::check_availability(&guard, &span, exclude).map_err(EngineError::Unavailable)
    }

    pub async fn free_ranges(
        &self,
        auth: &Authorization,
        start: Day,
        end: Day,
    ) -> Result<Vec<Span>, EngineError> {
        auth.operator()?;
        let window = validate_window(start, end)?;
        let guard = self.calendar.read().await;
        Ok(availability::free_ranges(&guard, &window))
    }

    pub async fn get_booking(&self, auth: &Authorization, id: Ulid) -> Result<Booking, EngineError> {
        auth.require_admin()?;
        let guard = self.calendar.read().await;
        guard.bookings.get(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    pub async fn get_request(&self, auth: &Authorization, id: Ulid) -> Result<BookingRequest, EngineError> {
        auth.require_admin()?;
        let guard = self.calendar.read().await;
        guard.requests.get(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// By check-in date.
    pub async fn list_bookings(&self, auth: &Authorization) -> Result<Vec<Booking>, EngineError> {
        auth.require_admin()?;
        let guard = self.calendar.read().await;
        let mut bookings: Vec<Booking> = guard.bookings.values().cloned().collect();
        bookings.sort_by_key(|b| (b.check_in, b.id));
        Ok(bookings)
    }

    /// Oldest first.
    pub async fn list_requests(&self, auth: &Authorization) -> Result<Vec<BookingRequest>, EngineError> {
        auth.require_admin()?;
        let guard = self.calendar.read().await;
        let mut requests: Vec<BookingRequest> = guard.requests.values().cloned().collect();
        requests.sort_by_key(|r| (r.created.at, r.id));
        Ok(requests)
    }

    pub async fn list_blocks(&self, auth: &Authorization) -> Result<Vec<CalendarBlock>, EngineError> {
        auth.operator()?;
        let guard = self.calendar.read().await;
        let mut blocks: Vec<CalendarBlock> = guard.blocks.values().cloned().collect();
        blocks.sort_by_key(|b| (b.range.start, b.id));
        Ok(blocks)
    }

    pub async fn list_channel_blocks(&self, auth: &Authorization) -> Result<Vec<ChannelBlock>, EngineError> {
        auth.operator()?;
        let guard = self.calendar.read().await;
        Ok(guard.channel_blocks.clone())
    }
}
