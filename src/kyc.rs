//! Identity-document verification attached to a booking.
//!
//! ```text
//! not_submitted ──submit──▶ submitted ──verify──▶ verified
//!                              │  ▲
//!                        reject│  │submit (re-upload)
//!                              ▼  │
//!                            rejected
//! ```
//!
//! The guards here only read the booking. The calendar store applies the
//! resulting event; nothing else writes KYC fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::limits::*;
use crate::model::{Booking, Stamp, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotSubmitted,
    Submitted,
    Verified,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::NotSubmitted => "not_submitted",
            KycStatus::Submitted => "submitted",
            KycStatus::Verified => "verified",
            KycStatus::Rejected => "rejected",
        }
    }

    /// State after a document is appended. `verified` is sticky.
    pub fn after_submit(self) -> KycStatus {
        match self {
            KycStatus::Verified => KycStatus::Verified,
            KycStatus::NotSubmitted | KycStatus::Submitted | KycStatus::Rejected => {
                KycStatus::Submitted
            }
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KycAction {
    Submit,
    Verify,
    Reject,
}

impl KycAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycAction::Submit => "submit",
            KycAction::Verify => "verify",
            KycAction::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycDocumentType {
    GovernmentId,
    Selfie,
    Other,
}

impl KycDocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycDocumentType::GovernmentId => "government_id",
            KycDocumentType::Selfie => "selfie",
            KycDocumentType::Other => "other",
        }
    }
}

impl FromStr for KycDocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "government_id" | "id" | "passport" => Ok(KycDocumentType::GovernmentId),
            "selfie" => Ok(KycDocumentType::Selfie),
            "other" => Ok(KycDocumentType::Other),
            other => Err(format!("unknown document type: {other}")),
        }
    }
}

/// Reference to a document held by the external object store. We never see the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycDocument {
    pub doc_type: KycDocumentType,
    pub storage_ref: String,
    pub uploaded_at: Timestamp,
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kyc {
    pub status: KycStatus,
    /// Append-only, oldest first.
    pub documents: Vec<KycDocument>,
    pub rejection_reason: Option<String>,
    pub verified: Option<Stamp>,
    pub rejected: Option<Stamp>,
}

impl Default for Kyc {
    fn default() -> Self {
        Self {
            status: KycStatus::NotSubmitted,
            documents: Vec::new(),
            rejection_reason: None,
            verified: None,
            rejected: None,
        }
    }
}

impl Kyc {
    pub(crate) fn append(&mut self, document: KycDocument) {
        self.status = self.status.after_submit();
        if self.status == KycStatus::Submitted {
            self.rejection_reason = None;
        }
        self.documents.push(document);
    }

    pub(crate) fn verify(&mut self, stamp: Stamp) {
        self.status = KycStatus::Verified;
        self.verified = Some(stamp);
    }

    pub(crate) fn reject(&mut self, reason: String, stamp: Stamp) {
        self.status = KycStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.rejected = Some(stamp);
    }
}

/// KYC work is only meaningful while the stay is upcoming or in progress.
fn guard_booking_open(booking: &Booking, action: KycAction) -> Result<(), EngineError> {
    if booking.status.is_terminal() {
        return Err(EngineError::KycInvalidTransition {
            id: booking.id,
            from: booking.kyc.status,
            action,
        });
    }
    Ok(())
}

pub fn guard_submit(booking: &Booking, document: &KycDocument) -> Result<(), EngineError> {
    guard_booking_open(booking, KycAction::Submit)?;
    if booking.kyc.documents.len() >= MAX_KYC_DOCUMENTS {
        return Err(EngineError::LimitExceeded("too many identity documents"));
    }
    if document.storage_ref.trim().is_empty() {
        return Err(EngineError::InvalidInput("storage reference is empty".into()));
    }
    if document.storage_ref.len() > MAX_REF_LEN {
        return Err(EngineError::LimitExceeded("storage reference too long"));
    }
    if document.content_type.trim().is_empty() {
        return Err(EngineError::InvalidInput("content type is empty".into()));
    }
    if document.size == 0 {
        return Err(EngineError::InvalidInput("document is empty".into()));
    }
    if document.size > MAX_KYC_DOCUMENT_BYTES {
        return Err(EngineError::LimitExceeded("document too large"));
    }
    Ok(())
}

pub fn guard_verify(booking: &Booking) -> Result<(), EngineError> {
    guard_booking_open(booking, KycAction::Verify)?;
    if booking.kyc.status != KycStatus::Submitted {
        return Err(EngineError::KycInvalidTransition {
            id: booking.id,
            from: booking.kyc.status,
            action: KycAction::Verify,
        });
    }
    Ok(())
}

/// Returns the trimmed reason to record.
pub fn guard_reject(booking: &Booking, reason: &str) -> Result<String, EngineError> {
    guard_booking_open(booking, KycAction::Reject)?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(EngineError::InvalidInput("rejection reason is required".into()));
    }
    if reason.len() > MAX_REASON_LEN {
        return Err(EngineError::LimitExceeded("reason too long"));
    }
    if booking.kyc.status != KycStatus::Submitted {
        return Err(EngineError::KycInvalidTransition {
            id: booking.id,
            from: booking.kyc.status,
            action: KycAction::Reject,
        });
    }
    Ok(reason.to_string())
}
