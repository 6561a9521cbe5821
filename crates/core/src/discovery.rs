//! Discovery identifiers: PINs, QR payloads, and email addresses.
//!
//! A PIN has the fixed shape `PIN-<3 letters><3 digits>` (e.g. `PIN-ALI001`).
//! Input is accepted case-insensitively and normalised to upper case before
//! lookup. QR codes carry a small JSON document wrapping a PIN.

use std::fmt;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::connection::reasons;
use crate::error::CoreError;
use crate::types::Timestamp;

const PIN_PATTERN: &str = r"^PIN-[A-Z]{3}[0-9]{3}$";

static PIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(PIN_PATTERN).expect("valid regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex")
});

/// Prefix shared by every PIN.
pub const PIN_PREFIX: &str = "PIN-";

/// Filler used when a display name has fewer than three letters.
const PIN_FILLER: char = 'X';

// ---------------------------------------------------------------------------
// Pin
// ---------------------------------------------------------------------------

/// A validated, upper-case discovery PIN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pin(String);

impl Pin {
    /// Parse and normalise a user-supplied PIN.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let normalised = raw.trim().to_ascii_uppercase();
        if PIN_RE.is_match(&normalised) {
            Ok(Pin(normalised))
        } else {
            Err(CoreError::Validation(reasons::INVALID_PIN.into()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Pin {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Pin::parse(&value)
    }
}

impl From<Pin> for String {
    fn from(pin: Pin) -> Self {
        pin.0
    }
}

/// Build a PIN candidate from a display name plus three random digits.
///
/// The letter block is the first three ASCII letters of the name, padded with
/// `X`. Candidates may collide; callers retry against the unique index.
pub fn pin_candidate<R: Rng + ?Sized>(display_name: &str, rng: &mut R) -> Pin {
    let mut letters: String = display_name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    while letters.len() < 3 {
        letters.push(PIN_FILLER);
    }
    let digits: u16 = rng.random_range(0..1000);
    Pin(format!("{PIN_PREFIX}{letters}{digits:03}"))
}

// ---------------------------------------------------------------------------
// QR payload
// ---------------------------------------------------------------------------

/// Contents of a connection QR code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrPayload {
    pub pin: Pin,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub issued_at: Option<Timestamp>,
}

impl QrPayload {
    /// Decode the JSON text scanned from a QR code.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        serde_json::from_str(raw).map_err(|_| CoreError::Validation(reasons::INVALID_QR.into()))
    }
}

// ---------------------------------------------------------------------------
// Email
// ---------------------------------------------------------------------------

/// Trim and lower-case an email address, rejecting obviously malformed input.
pub fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let email = raw.trim().to_lowercase();
    if EMAIL_RE.is_match(&email) {
        Ok(email)
    } else {
        Err(CoreError::Validation(reasons::INVALID_EMAIL.into()))
    }
}
