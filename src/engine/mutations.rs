use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::auth::Authorization;
use crate::ical;
use crate::kyc::{self, KycDocument, KycDocumentType};
use crate::lifecycle::{self, CancelOutcome, NoShowOutcome};
use crate::limits::*;
use crate::model::*;
use crate::phone;

use super::availability::{check_availability, first_booking_conflict};
use super::conflict::{validate_block, validate_stay, validate_text, Conflict};
use super::store::{nights_and_total, CalendarStore};
use super::{Engine, EngineError};

/// A stay as typed by a guest or staff member, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StayInput {
    pub id: Ulid,
    pub guest_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub check_in: Day,
    pub check_out: Day,
    pub price_per_night: u64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInput {
    pub id: Ulid,
    /// Inclusive.
    pub start: Day,
    /// Inclusive.
    pub end: Day,
    pub kind: BlockKind,
    pub reason: String,
    pub note: Option<String>,
}

/// Reference to an uploaded identity document, as reported by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInput {
    pub doc_type: KycDocumentType,
    pub storage_ref: String,
    pub content_type: String,
    pub size: u64,
}

fn unavailable(conflict: Conflict) -> EngineError {
    metrics::counter!(
        crate::observability::AVAILABILITY_CONFLICTS_TOTAL,
        "kind" => conflict.kind.as_str()
    )
    .increment(1);
    debug!(kind = conflict.kind.as_str(), id = %conflict.id, span = %conflict.span, "availability conflict");
    EngineError::Unavailable(conflict)
}

fn find_booking<'a>(store: &'a CalendarStore, id: &Ulid) -> Result<&'a Booking, EngineError> {
    store.bookings.get(id).ok_or(EngineError::NotFound(*id))
}

fn clean_optional(value: Option<&str>, field: &'static str, max: usize) -> Result<Option<String>, EngineError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => {
            validate_text(v, field, max)?;
            Ok(Some(v.to_string()))
        }
    }
}

fn clean_name(name: &str) -> Result<String, EngineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidInput("guest name is required".into()));
    }
    validate_text(name, "guest name too long", MAX_NAME_LEN)?;
    Ok(name.to_string())
}

fn clean_email(email: &str) -> Result<String, EngineError> {
    let email = email.trim();
    if email.is_empty() {
        return Ok(String::new());
    }
    validate_text(email, "email too long", MAX_EMAIL_LEN)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email.to_string()),
        _ => Err(EngineError::InvalidInput(format!("invalid email: {email}"))),
    }
}

impl Engine {
    fn guest_contact(&self, stay: &StayInput) -> Result<GuestContact, EngineError> {
        let name = clean_name(&stay.guest_name)?;
        let phone = phone::normalize(&stay.phone, &self.country_code)
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
        let email = match stay.email.as_deref() {
            Some(e) => Some(clean_email(e)?).filter(|e| !e.is_empty()),
            None => None,
        };
        Ok(GuestContact { name, phone, email })
    }

    // ── Approval workflow ────────────────────────────────────

    /// Guest submission. Checked against the calendar so hopeless requests
    /// never reach the approval queue; pending requests don't hold dates.
    pub async fn submit_request(&self, auth: &Authorization, stay: StayInput) -> Result<(), EngineError> {
        let op = auth.operator()?;
        let span = validate_stay(stay.check_in, stay.check_out)?;
        let guest = self.guest_contact(&stay)?;
        let notes = clean_optional(stay.notes.as_deref(), "notes too long", MAX_NOTES_LEN)?;
        let (nights, total_amount) = nights_and_total(&span, stay.price_per_night);

        let mut guard = self.calendar.write().await;
        if guard.requests.len() >= MAX_REQUESTS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many booking requests"));
        }
        if guard.contains_id(&stay.id) {
            return Err(EngineError::AlreadyExists(stay.id));
        }
        check_availability(&guard, &span, None).map_err(unavailable)?;

        let request = BookingRequest {
            id: stay.id,
            guest,
            check_in: span.start,
            check_out: span.end,
            nights,
            price_per_night: stay.price_per_night,
            total_amount,
            notes,
            status: RequestStatus::Pending,
            created: Stamp::new(self.clock.now(), op.id.clone()),
            processed: None,
            booking_id: None,
            rejection_reason: None,
        };
        self.persist_and_apply(&mut guard, &Event::RequestSubmitted { request })
            .await?;
        info!(request = %stay.id, by = %op.id, span = %span, "booking request submitted");
        Ok(())
    }

    /// Promote a pending request into a confirmed booking. The write guard
    /// serializes concurrent approvals, so the loser sees the request already
    /// processed.
    pub async fn approve_request(&self, auth: &Authorization, request_id: Ulid) -> Result<Ulid, EngineError> {
        let op = auth.require_admin()?;
        let mut guard = self.calendar.write().await;

        let request = guard
            .requests
            .get(&request_id)
            .ok_or(EngineError::NotFound(request_id))?;
        if request.status != RequestStatus::Pending {
            return Err(EngineError::AlreadyProcessed {
                id: request_id,
                status: request.status,
            });
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many bookings"));
        }
        let span = Span::checked(request.check_in, request.check_out).ok_or(
            EngineError::InvalidRange {
                start: request.check_in,
                end: request.check_out,
            },
        )?;
        if let Err(conflict) = check_availability(&guard, &span, None) {
            warn!(request = %request_id, conflict = %conflict, "approval blocked");
            return Err(unavailable(conflict));
        }

        let stamp = Stamp::new(self.clock.now(), op.id.clone());
        let booking = Booking {
            id: Ulid::new(),
            request_id: Some(request_id),
            guest: request.guest.clone(),
            check_in: request.check_in,
            check_out: request.check_out,
            nights: request.nights,
            price_per_night: request.price_per_night,
            total_amount: request.total_amount,
            notes: request.notes.clone(),
            status: BookingStatus::Confirmed,
            kyc: kyc::Kyc::default(),
            no_show: false,
            source: BookingSource::Direct,
            channel: None,
            created: stamp.clone(),
            checked_in: None,
            checked_out: None,
            cancellation: None,
            last_edit: None,
        };
        let booking_id = booking.id;
        let event = Event::RequestApproved {
            request_id,
            booking,
            stamp,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        metrics::counter!(crate::observability::APPROVALS_TOTAL).increment(1);
        info!(request = %request_id, booking = %booking_id, by = %op.id, span = %span, "request approved");
        Ok(booking_id)
    }

    pub async fn reject_request(
        &self,
        auth: &Authorization,
        request_id: Ulid,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        let op = auth.require_admin()?;
        let reason = clean_optional(reason.as_deref(), "reason too long", MAX_REASON_LEN)?;
        let mut guard = self.calendar.write().await;

        let request = guard
            .requests
            .get(&request_id)
            .ok_or(EngineError::NotFound(request_id))?;
        if request.status != RequestStatus::Pending {
            return Err(EngineError::AlreadyProcessed {
                id: request_id,
                status: request.status,
            });
        }

        let event = Event::RequestRejected {
            request_id,
            reason,
            stamp: Stamp::new(self.clock.now(), op.id.clone()),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(request = %request_id, by = %op.id, "request rejected");
        Ok(())
    }

    /// Staff-entered booking, bypassing the request queue. With `channel`
    /// set it records a reservation taken on an external channel.
    pub async fn create_booking(
        &self,
        auth: &Authorization,
        stay: StayInput,
        channel: Option<ChannelRef>,
    ) -> Result<(), EngineError> {
        let op = auth.require_admin()?;
        let span = validate_stay(stay.check_in, stay.check_out)?;
        let guest = self.guest_contact(&stay)?;
        let notes = clean_optional(stay.notes.as_deref(), "notes too long", MAX_NOTES_LEN)?;
        let channel = match channel {
            Some(c) => {
                let name = c.channel.trim();
                if name.is_empty() {
                    return Err(EngineError::InvalidInput("channel name is required".into()));
                }
                validate_text(name, "channel name too long", MAX_NAME_LEN)?;
                Some(ChannelRef {
                    channel: name.to_string(),
                    external_ref: clean_optional(
                        c.external_ref.as_deref(),
                        "external reference too long",
                        MAX_REF_LEN,
                    )?,
                })
            }
            None => None,
        };
        let (nights, total_amount) = nights_and_total(&span, stay.price_per_night);

        let mut guard = self.calendar.write().await;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many bookings"));
        }
        if guard.contains_id(&stay.id) {
            return Err(EngineError::AlreadyExists(stay.id));
        }
        check_availability(&guard, &span, None).map_err(unavailable)?;

        let booking = Booking {
            id: stay.id,
            request_id: None,
            guest,
            check_in: span.start,
            check_out: span.end,
            nights,
            price_per_night: stay.price_per_night,
            total_amount,
            notes,
            status: BookingStatus::Confirmed,
            kyc: kyc::Kyc::default(),
            no_show: false,
            source: if channel.is_some() {
                BookingSource::Channel
            } else {
                BookingSource::AdminManual
            },
            channel,
            created: Stamp::new(self.clock.now(), op.id.clone()),
            checked_in: None,
            checked_out: None,
            cancellation: None,
            last_edit: None,
        };
        let source = booking.source;
        self.persist_and_apply(&mut guard, &Event::BookingCreated { booking })
            .await?;
        info!(booking = %stay.id, by = %op.id, span = %span, source = source.as_str(), "booking created");
        Ok(())
    }

    // ── Calendar blocks ──────────────────────────────────────

    /// Blocks only yield to occupying bookings; overlapping other blocks is fine.
    pub async fn create_block(&self, auth: &Authorization, input: BlockInput) -> Result<(), EngineError> {
        let op = auth.require_admin()?;
        let range = validate_block(input.start, input.end)?;
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(EngineError::InvalidInput("block reason is required".into()));
        }
        validate_text(reason, "reason too long", MAX_REASON_LEN)?;
        let note = clean_optional(input.note.as_deref(), "note too long", MAX_NOTES_LEN)?;

        let mut guard = self.calendar.write().await;
        if guard.blocks.len() >= MAX_BLOCKS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many blocks"));
        }
        if guard.contains_id(&input.id) {
            return Err(EngineError::AlreadyExists(input.id));
        }
        if let Some(conflict) = first_booking_conflict(&guard, &range.to_span(), None) {
            return Err(unavailable(conflict));
        }

        let block = CalendarBlock {
            id: input.id,
            range,
            kind: input.kind,
            reason: reason.to_string(),
            note,
            created: Stamp::new(self.clock.now(), op.id.clone()),
        };
        self.persist_and_apply(&mut guard, &Event::BlockCreated { block })
            .await?;
        info!(block = %input.id, by = %op.id, start = %range.start, end = %range.end, "block created");
        Ok(())
    }

    pub async fn delete_block(&self, auth: &Authorization, id: Ulid) -> Result<(), EngineError> {
        let op = auth.require_admin()?;
        let mut guard = self.calendar.write().await;
        if !guard.blocks.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        self.persist_and_apply(&mut guard, &Event::BlockDeleted { id })
            .await?;
        info!(block = %id, by = %op.id, "block deleted");
        Ok(())
    }

    // ── Booking lifecycle ────────────────────────────────────

    pub async fn check_in(&self, auth: &Authorization, id: Ulid) -> Result<(), EngineError> {
        let op = auth.require_admin()?;
        let mut guard = self.calendar.write().await;
        let booking = find_booking(&guard, &id)?;
        lifecycle::check_in(booking)?;

        let event = Event::BookingCheckedIn {
            id,
            stamp: Stamp::new(self.clock.now(), op.id.clone()),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(booking = %id, by = %op.id, "guest checked in");
        Ok(())
    }

    pub async fn check_out(&self, auth: &Authorization, id: Ulid) -> Result<(), EngineError> {
        let op = auth.require_admin()?;
        let mut guard = self.calendar.write().await;
        let booking = find_booking(&guard, &id)?;
        lifecycle::check_out(booking)?;

        let event = Event::BookingCheckedOut {
            id,
            stamp: Stamp::new(self.clock.now(), op.id.clone()),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(booking = %id, by = %op.id, "guest checked out");
        Ok(())
    }

    /// Replaying a cancel returns `AlreadyCancelled` and leaves the original
    /// cancellation record alone.
    pub async fn cancel_booking(
        &self,
        auth: &Authorization,
        id: Ulid,
        reason: Option<String>,
        kind: Option<CancellationType>,
    ) -> Result<CancelOutcome, EngineError> {
        let op = auth.require_admin()?;
        let kind = kind.unwrap_or(CancellationType::Admin);
        if kind == CancellationType::NoShow {
            return Err(EngineError::InvalidInput(
                "no-show is recorded with mark_no_show".into(),
            ));
        }
        let reason = clean_optional(reason.as_deref(), "reason too long", MAX_REASON_LEN)?;

        let mut guard = self.calendar.write().await;
        let booking = find_booking(&guard, &id)?;
        let outcome = lifecycle::cancel(booking)?;
        if outcome == CancelOutcome::AlreadyCancelled {
            debug!(booking = %id, "cancel replay");
            return Ok(outcome);
        }

        let event = Event::BookingCancelled {
            id,
            cancellation: Cancellation {
                stamp: Stamp::new(self.clock.now(), op.id.clone()),
                reason,
                kind,
            },
            no_show: false,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(booking = %id, by = %op.id, kind = kind.as_str(), "booking cancelled");
        Ok(outcome)
    }

    pub async fn mark_no_show(&self, auth: &Authorization, id: Ulid) -> Result<NoShowOutcome, EngineError> {
        let op = auth.require_admin()?;
        let mut guard = self.calendar.write().await;
        let booking = find_booking(&guard, &id)?;
        let outcome = lifecycle::no_show(booking, self.clock.today())?;
        if outcome == NoShowOutcome::AlreadyMarked {
            debug!(booking = %id, "no-show replay");
            return Ok(outcome);
        }

        let event = Event::BookingCancelled {
            id,
            cancellation: Cancellation {
                stamp: Stamp::new(self.clock.now(), op.id.clone()),
                reason: None,
                kind: CancellationType::NoShow,
            },
            no_show: true,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(booking = %id, by = %op.id, "booking marked no-show");
        Ok(outcome)
    }

    /// Admin field edit. Moving dates, or bringing a booking back into an
    /// occupying status, re-checks the calendar with the booking itself excluded.
    pub async fn edit_booking(&self, auth: &Authorization, id: Ulid, edit: BookingEdit) -> Result<(), EngineError> {
        let op = auth.require_admin()?;
        let patch = BookingPatch {
            status: edit.status,
            guest_name: edit.guest_name.as_deref().map(clean_name).transpose()?,
            phone: edit
                .phone
                .as_deref()
                .map(|p| phone::normalize(p, &self.country_code))
                .transpose()
                .map_err(|e| EngineError::InvalidInput(e.to_string()))?,
            email: edit.email.as_deref().map(clean_email).transpose()?,
            notes: match edit.notes.as_deref().map(str::trim) {
                Some(n) => {
                    validate_text(n, "notes too long", MAX_NOTES_LEN)?;
                    Some(n.to_string())
                }
                None => None,
            },
            check_in: edit.check_in,
            check_out: edit.check_out,
        };
        if patch == BookingPatch::default() {
            return Err(EngineError::InvalidInput("edit changes nothing".into()));
        }

        let mut guard = self.calendar.write().await;
        let booking = find_booking(&guard, &id)?;
        lifecycle::edit(booking, &patch)?;

        let (check_in, check_out) = lifecycle::dates_after(booking, &patch);
        if patch.check_in.is_some() || patch.check_out.is_some() {
            validate_stay(check_in, check_out)?;
        }
        if lifecycle::edit_claims_days(booking, &patch) {
            let span = Span::new(check_in, check_out);
            check_availability(&guard, &span, Some(id)).map_err(unavailable)?;
        }

        let event = Event::BookingEdited {
            id,
            patch,
            stamp: Stamp::new(self.clock.now(), op.id.clone()),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(booking = %id, by = %op.id, "booking edited");
        Ok(())
    }

    // ── KYC ──────────────────────────────────────────────────

    /// Guests upload their own documents, so any permitted caller may append.
    pub async fn append_kyc_document(
        &self,
        auth: &Authorization,
        booking_id: Ulid,
        input: DocumentInput,
    ) -> Result<(), EngineError> {
        let op = auth.operator()?;
        let document = KycDocument {
            doc_type: input.doc_type,
            storage_ref: input.storage_ref.trim().to_string(),
            uploaded_at: self.clock.now(),
            content_type: input.content_type.trim().to_string(),
            size: input.size,
        };

        let mut guard = self.calendar.write().await;
        let booking = find_booking(&guard, &booking_id)?;
        kyc::guard_submit(booking, &document)?;

        let doc_type = document.doc_type;
        self.persist_and_apply(
            &mut guard,
            &Event::KycDocumentAdded {
                booking_id,
                document,
            },
        )
        .await?;
        info!(booking = %booking_id, by = %op.id, doc_type = doc_type.as_str(), "identity document added");
        Ok(())
    }

    pub async fn verify_kyc(&self, auth: &Authorization, booking_id: Ulid) -> Result<(), EngineError> {
        let op = auth.require_admin()?;
        let mut guard = self.calendar.write().await;
        let booking = find_booking(&guard, &booking_id)?;
        kyc::guard_verify(booking)?;

        let event = Event::KycVerified {
            booking_id,
            stamp: Stamp::new(self.clock.now(), op.id.clone()),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(booking = %booking_id, by = %op.id, "identity verified");
        Ok(())
    }

    pub async fn reject_kyc(&self, auth: &Authorization, booking_id: Ulid, reason: &str) -> Result<(), EngineError> {
        let op = auth.require_admin()?;
        let mut guard = self.calendar.write().await;
        let booking = find_booking(&guard, &booking_id)?;
        let reason = kyc::guard_reject(booking, reason)?;

        let event = Event::KycRejected {
            booking_id,
            reason,
            stamp: Stamp::new(self.clock.now(), op.id.clone()),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(booking = %booking_id, by = %op.id, "identity documents rejected");
        Ok(())
    }

    // ── Channel feed ─────────────────────────────────────────

    /// Replace the channel blocks with the ranges in `ics`. Held in memory
    /// only; a restart clears them until the next import.
    pub async fn import_channel_feed(&self, auth: &Authorization, ics: &str) -> Result<usize, EngineError> {
        let op = auth.require_admin()?;
        if ics.len() > MAX_FEED_BYTES {
            return Err(EngineError::LimitExceeded("channel feed too large"));
        }
        let blocks = ical::parse_feed(ics).map_err(|e| EngineError::InvalidInput(e.to_string()))?;
        if blocks.len() > MAX_CHANNEL_BLOCKS {
            return Err(EngineError::LimitExceeded("too many channel blocks"));
        }

        let count = blocks.len();
        let mut guard = self.calendar.write().await;
        guard.channel_blocks = blocks;
        drop(guard);

        info!(blocks = count, by = %op.id, "channel feed imported");
        Ok(count)
    }
}
