//! Ticket codec.
//!
//! Encodes the payload a scannable-code collaborator embeds in a ticket's
//! image, and decodes what a door scanner reads back. The engine never sees
//! the image format, only this string:
//!
//! ```text
//! RSVP1.<base64url( bincode(payload) || sha256(bincode(payload))[..8] )>
//! ```
//!
//! The checksum catches truncated or corrupted scans. It is not a signature:
//! the unguessable ticket id is what authorizes entry, and the validator
//! re-checks it against the ledger.

use crate::error::{InvalidTicketReason, RsvpError};
use crate::types::{EventId, Ticket, TicketId, UserId};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Version prefix of every encoded ticket
pub const TICKET_CODE_PREFIX: &str = "RSVP1.";

const CHECKSUM_LEN: usize = 8;

/// Metadata carried by a ticket's scannable representation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPayload {
    /// Ticket to validate
    pub ticket_id: TicketId,
    /// Event the ticket was issued for
    pub event_id: EventId,
    /// Holder
    pub user_id: UserId,
    /// Mint time
    pub issued_at: DateTime<Utc>,
}

impl From<&Ticket> for TicketPayload {
    fn from(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.id,
            event_id: ticket.event_id,
            user_id: ticket.user_id,
            issued_at: ticket.issued_at,
        }
    }
}

/// Decoding failures
#[derive(Error, Debug)]
pub enum CodecError {
    /// Missing or unsupported version prefix
    #[error("ticket code does not start with {TICKET_CODE_PREFIX}")]
    UnknownFormat,

    /// Body is not base64url
    #[error("ticket code body is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Body shorter than the checksum
    #[error("ticket code body is truncated")]
    Truncated,

    /// Checksum does not match the payload
    #[error("ticket code checksum mismatch")]
    ChecksumMismatch,

    /// Payload bytes did not deserialize
    #[error("ticket payload is corrupt: {0}")]
    Payload(#[from] bincode::Error),
}

impl From<CodecError> for RsvpError {
    fn from(_: CodecError) -> Self {
        Self::invalid_ticket(InvalidTicketReason::Malformed)
    }
}

fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Encode a payload into its scannable string form
///
/// # Errors
///
/// Returns [`CodecError::Payload`] if the payload cannot be serialized.
pub fn encode(payload: &TicketPayload) -> Result<String, CodecError> {
    let mut frame = bincode::serialize(payload)?;
    let sum = checksum(&frame);
    frame.extend_from_slice(&sum);
    Ok(format!("{TICKET_CODE_PREFIX}{}", URL_SAFE_NO_PAD.encode(frame)))
}

/// Encode a ticket's payload
///
/// # Errors
///
/// Returns [`CodecError::Payload`] if the payload cannot be serialized.
pub fn encode_ticket(ticket: &Ticket) -> Result<String, CodecError> {
    encode(&TicketPayload::from(ticket))
}

/// Decode a scanned string back into its payload
///
/// Leading and trailing whitespace (scanner line endings) is ignored.
///
/// # Errors
///
/// Returns a [`CodecError`] describing why the code is malformed.
pub fn decode(code: &str) -> Result<TicketPayload, CodecError> {
    let body = code
        .trim()
        .strip_prefix(TICKET_CODE_PREFIX)
        .ok_or(CodecError::UnknownFormat)?;
    let frame = URL_SAFE_NO_PAD.decode(body)?;
    if frame.len() <= CHECKSUM_LEN {
        return Err(CodecError::Truncated);
    }
    let (payload, sum) = frame.split_at(frame.len() - CHECKSUM_LEN);
    if checksum(payload) != sum {
        return Err(CodecError::ChecksumMismatch);
    }
    Ok(bincode::deserialize(payload)?)
}
