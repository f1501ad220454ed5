use std::collections::HashMap;

use ulid::Ulid;

use crate::model::*;

/// Everything one villa calendar knows. Mutated only through [`CalendarStore::apply_event`]
/// and the channel feed swap, both under the engine's write guard.
#[derive(Debug, Default)]
pub struct CalendarStore {
    pub requests: HashMap<Ulid, BookingRequest>,
    pub bookings: HashMap<Ulid, Booking>,
    pub blocks: HashMap<Ulid, CalendarBlock>,
    /// Feed order. Replaced wholesale on import, never logged.
    pub channel_blocks: Vec<ChannelBlock>,
    pub calendar: Calendar,
}

pub(crate) fn nights_and_total(span: &Span, price_per_night: u64) -> (u32, u64) {
    let nights = span.nights().max(0) as u32;
    (nights, price_per_night.saturating_mul(nights as u64))
}

impl CalendarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_id(&self, id: &Ulid) -> bool {
        self.requests.contains_key(id) || self.bookings.contains_key(id) || self.blocks.contains_key(id)
    }

    fn index_booking(&mut self, booking: &Booking) {
        self.calendar.insert_interval(Interval {
            id: booking.id,
            span: booking.span(),
            kind: IntervalKind::Booking,
        });
    }

    fn insert_booking(&mut self, booking: Booking) {
        self.index_booking(&booking);
        self.bookings.insert(booking.id, booking);
    }

    // ── Event application ────────────────────────────────────

    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::RequestSubmitted { request } => {
                self.requests.insert(request.id, request.clone());
            }
            Event::RequestApproved {
                request_id,
                booking,
                stamp,
            } => {
                if let Some(req) = self.requests.get_mut(request_id) {
                    req.status = RequestStatus::Approved;
                    req.processed = Some(stamp.clone());
                    req.booking_id = Some(booking.id);
                }
                self.insert_booking(booking.clone());
            }
            Event::RequestRejected {
                request_id,
                reason,
                stamp,
            } => {
                if let Some(req) = self.requests.get_mut(request_id) {
                    req.status = RequestStatus::Rejected;
                    req.processed = Some(stamp.clone());
                    req.rejection_reason = reason.clone();
                }
            }
            Event::BookingCreated { booking } => {
                self.insert_booking(booking.clone());
            }
            Event::BookingCheckedIn { id, stamp } => {
                if let Some(b) = self.bookings.get_mut(id) {
                    b.status = BookingStatus::CheckedIn;
                    b.checked_in = Some(stamp.clone());
                }
            }
            Event::BookingCheckedOut { id, stamp } => {
                if let Some(b) = self.bookings.get_mut(id) {
                    b.status = BookingStatus::CheckedOut;
                    b.checked_out = Some(stamp.clone());
                }
            }
            Event::BookingCancelled {
                id,
                cancellation,
                no_show,
            } => {
                if let Some(b) = self.bookings.get_mut(id) {
                    b.status = BookingStatus::Cancelled;
                    b.cancellation = Some(cancellation.clone());
                    b.no_show = *no_show;
                }
            }
            Event::BookingEdited { id, patch, stamp } => {
                let Some(b) = self.bookings.get_mut(id) else {
                    return;
                };
                let old_span = b.span();
                apply_patch(b, patch);
                b.last_edit = Some(stamp.clone());
                let new_span = b.span();
                if new_span != old_span {
                    self.calendar.remove_interval(*id);
                    self.calendar.insert_interval(Interval {
                        id: *id,
                        span: new_span,
                        kind: IntervalKind::Booking,
                    });
                }
            }
            Event::KycDocumentAdded {
                booking_id,
                document,
            } => {
                if let Some(b) = self.bookings.get_mut(booking_id) {
                    b.kyc.append(document.clone());
                }
            }
            Event::KycVerified { booking_id, stamp } => {
                if let Some(b) = self.bookings.get_mut(booking_id) {
                    b.kyc.verify(stamp.clone());
                }
            }
            Event::KycRejected {
                booking_id,
                reason,
                stamp,
            } => {
                if let Some(b) = self.bookings.get_mut(booking_id) {
                    b.kyc.reject(reason.clone(), stamp.clone());
                }
            }
            Event::BlockCreated { block } => {
                self.calendar.insert_interval(Interval {
                    id: block.id,
                    span: block.range.to_span(),
                    kind: IntervalKind::Block,
                });
                self.blocks.insert(block.id, block.clone());
            }
            Event::BlockDeleted { id } => {
                self.calendar.remove_interval(*id);
                self.blocks.remove(id);
            }
        }
    }

    /// Current state as the shortest event sequence that rebuilds it.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(
            self.requests.len() + self.bookings.len() + self.blocks.len(),
        );

        let mut requests: Vec<_> = self.requests.values().collect();
        requests.sort_by_key(|r| r.id);
        for request in requests {
            events.push(Event::RequestSubmitted {
                request: request.clone(),
            });
        }

        let mut bookings: Vec<_> = self.bookings.values().collect();
        bookings.sort_by_key(|b| b.id);
        for booking in bookings {
            events.push(Event::BookingCreated {
                booking: booking.clone(),
            });
        }

        let mut blocks: Vec<_> = self.blocks.values().collect();
        blocks.sort_by_key(|b| b.id);
        for block in blocks {
            events.push(Event::BlockCreated {
                block: block.clone(),
            });
        }

        events
    }
}

/// Empty strings clear optional text fields.
fn apply_patch(b: &mut Booking, patch: &BookingPatch) {
    if let Some(status) = patch.status {
        b.status = status;
        if status != BookingStatus::Cancelled {
            b.cancellation = None;
            b.no_show = false;
        }
    }
    if let Some(name) = &patch.guest_name {
        b.guest.name = name.clone();
    }
    if let Some(phone) = &patch.phone {
        b.guest.phone = phone.clone();
    }
    if let Some(email) = &patch.email {
        b.guest.email = (!email.is_empty()).then(|| email.clone());
    }
    if let Some(notes) = &patch.notes {
        b.notes = (!notes.is_empty()).then(|| notes.clone());
    }
    if let Some(d) = patch.check_in {
        b.check_in = d;
    }
    if let Some(d) = patch.check_out {
        b.check_out = d;
    }
    let (nights, total) = nights_and_total(&b.span(), b.price_per_night);
    b.nights = nights;
    b.total_amount = total;
}
