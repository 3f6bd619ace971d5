//! Domain layer modules
//!
//! This module contains business domain logic:
//! - `notification`: Request types and the send dispatcher
//! - `ratelimit`: Per-recipient, per-category admission control
//! - `idempotency`: Processed-request markers
//! - `identity`: Recipient lookup

pub mod idempotency;
pub mod identity;
pub mod notification;
pub mod ratelimit;
