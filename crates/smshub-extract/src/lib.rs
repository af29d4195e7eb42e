//! Pure text-processing functions for the SMS hub: payload field
//! resolution, receive-time normalization, and OTP extraction heuristics.
//! Everything here is deterministic and side-effect free; the HTTP and
//! storage layers live in smshub-api and smshub-db.

pub mod fields;
pub mod otp;
pub mod time;

pub use fields::{Payload, resolve_field};
pub use otp::{contains_otp_keyword, extract_code};
pub use time::{format_timestamp, normalize_time};
