//! Trust-level state machine.
//!
//! An accepted connection sits on one of five trust levels. Each level
//! unlocks a set of capabilities, and capability sets are cumulative: level N
//! grants everything from levels 1..=N. Advancing is strictly one step at a
//! time, gated by interaction thresholds and, from level 3 upward, by both
//! parties consenting to the same target level.
//!
//! Everything in this module is a pure function over a [`ConnectionSnapshot`]
//! and the process-wide [`TrustLadder`]. Derived state (capabilities,
//! eligibility) is recomputed on every call rather than cached.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::connection::{reasons, ConnectionStatus};
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Maximum characters per message while only limited text is unlocked.
pub const LIMITED_TEXT_MAX_CHARS: usize = 280;

// ---------------------------------------------------------------------------
// TrustLevel
// ---------------------------------------------------------------------------

/// A trust level in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TrustLevel(u8);

impl TrustLevel {
    /// Level every new connection starts at.
    pub const INITIAL: TrustLevel = TrustLevel(1);
    /// Highest reachable level.
    pub const MAX: TrustLevel = TrustLevel(5);

    pub fn new(value: u8) -> Result<Self, CoreError> {
        if (Self::INITIAL.0..=Self::MAX.0).contains(&value) {
            Ok(TrustLevel(value))
        } else {
            Err(CoreError::Validation(format!(
                "trust level must be between {} and {}, got {value}",
                Self::INITIAL.0,
                Self::MAX.0
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_max(self) -> bool {
        self == Self::MAX
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for TrustLevel {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        TrustLevel::new(value)
    }
}

impl TryFrom<i16> for TrustLevel {
    type Error = CoreError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        let value = u8::try_from(value)
            .map_err(|_| CoreError::Validation(format!("trust level out of range: {value}")))?;
        TrustLevel::new(value)
    }
}

impl From<TrustLevel> for u8 {
    fn from(level: TrustLevel) -> Self {
        level.0
    }
}

impl From<TrustLevel> for i16 {
    fn from(level: TrustLevel) -> Self {
        i16::from(level.0)
    }
}

/// The level after `level`, capped at [`TrustLevel::MAX`].
pub fn next_level(level: TrustLevel) -> TrustLevel {
    if level.is_max() {
        level
    } else {
        TrustLevel(level.0 + 1)
    }
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

define_text_enum! {
    /// A communication feature gated by trust level.
    Capability {
        Discovery = "discovery",
        LimitedText = "limited_text",
        TextChat = "text_chat",
        VoiceCall = "voice_call",
        VideoCall = "video_call",
        InPersonMeetup = "in_person_meetup",
        SafetyCheckIn = "safety_check_in",
    }
}

// ---------------------------------------------------------------------------
// Ladder definition
// ---------------------------------------------------------------------------

/// Thresholds a connection must meet to *reach* a level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelRequirements {
    pub min_days_connected: i64,
    pub min_messages: i64,
    pub min_voice_calls: i64,
    pub min_video_calls: i64,
    /// Both parties must propose this level before it takes effect.
    pub mutual_consent: bool,
}

/// Static description of one trust level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDefinition {
    pub level: TrustLevel,
    pub name: String,
    /// Capabilities introduced at this level (not including lower levels).
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub requirements: LevelRequirements,
}

/// The five level definitions, loaded once at start-up and read-only after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLadder")]
pub struct TrustLadder {
    levels: Vec<LevelDefinition>,
}

#[derive(Deserialize)]
struct RawLadder {
    levels: Vec<LevelDefinition>,
}

impl TryFrom<RawLadder> for TrustLadder {
    type Error = CoreError;

    fn try_from(raw: RawLadder) -> Result<Self, Self::Error> {
        TrustLadder::new(raw.levels)
    }
}

impl TrustLadder {
    /// Build a ladder, checking that levels 1..=5 appear exactly once and in order.
    pub fn new(levels: Vec<LevelDefinition>) -> Result<Self, CoreError> {
        if levels.len() != usize::from(TrustLevel::MAX.0) {
            return Err(CoreError::Validation(format!(
                "trust ladder must define {} levels, got {}",
                TrustLevel::MAX.0,
                levels.len()
            )));
        }
        for (index, def) in levels.iter().enumerate() {
            let expected = index + 1;
            if usize::from(def.level.0) != expected {
                return Err(CoreError::Validation(format!(
                    "trust ladder entry {index} must be level {expected}, got {}",
                    def.level
                )));
            }
        }
        Ok(Self { levels })
    }

    /// Parse a ladder from its JSON form (`{"levels": [...]}`).
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::Validation(format!("invalid trust ladder: {e}")))
    }

    pub fn definition(&self, level: TrustLevel) -> &LevelDefinition {
        &self.levels[usize::from(level.0 - 1)]
    }

    pub fn levels(&self) -> &[LevelDefinition] {
        &self.levels
    }

    /// Cumulative capability set at `level`.
    pub fn capabilities_at(&self, level: TrustLevel) -> BTreeSet<Capability> {
        self.levels
            .iter()
            .take(usize::from(level.0))
            .flat_map(|def| def.capabilities.iter().copied())
            .collect()
    }

    pub fn has_capability(&self, level: TrustLevel, capability: Capability) -> bool {
        self.levels
            .iter()
            .take(usize::from(level.0))
            .any(|def| def.capabilities.contains(&capability))
    }

    /// Longest text message permitted at `level`: `None` if text is locked,
    /// `Some(usize::MAX)` once full text chat is unlocked.
    pub fn text_allowance(&self, level: TrustLevel) -> Option<usize> {
        if self.has_capability(level, Capability::TextChat) {
            Some(usize::MAX)
        } else if self.has_capability(level, Capability::LimitedText) {
            Some(LIMITED_TEXT_MAX_CHARS)
        } else {
            None
        }
    }

    pub fn requires_mutual_consent(&self, target: TrustLevel) -> bool {
        self.definition(target).requirements.mutual_consent
    }

    /// Whether `metrics` satisfy the numeric thresholds for reaching `target`.
    pub fn thresholds_met(&self, target: TrustLevel, metrics: &InteractionMetrics) -> bool {
        let req = &self.definition(target).requirements;
        metrics.days_connected >= req.min_days_connected
            && metrics.messages >= req.min_messages
            && metrics.voice_calls >= req.min_voice_calls
            && metrics.video_calls >= req.min_video_calls
    }

    /// Check that a caller-supplied target is the one legal next step.
    ///
    /// At the cap every request is an idempotent no-op; below it the target
    /// must be exactly `current + 1`.
    pub fn validate_target(
        &self,
        snapshot: &ConnectionSnapshot,
        requested: i32,
    ) -> Result<LevelUpDecision, CoreError> {
        ensure_accepted(snapshot)?;
        if snapshot.trust_level.is_max() {
            return Ok(LevelUpDecision::AtCap);
        }
        let current = i32::from(snapshot.trust_level.0);
        if requested < current {
            return Err(CoreError::InvalidState(reasons::DOWNGRADE_NOT_PERMITTED.into()));
        }
        if requested == current {
            return Err(CoreError::InvalidState(reasons::ALREADY_AT_LEVEL.into()));
        }
        if requested > current + 1 {
            return Err(CoreError::InvalidState(reasons::LEVEL_SKIP.into()));
        }
        Ok(LevelUpDecision::Advance(next_level(snapshot.trust_level)))
    }

    /// Full eligibility check for advancing one level.
    ///
    /// Fails with `InvalidState` for non-accepted connections or unmet
    /// thresholds, and with `Forbidden("mutual consent required")` when the
    /// target level is consent-gated and `consent` does not show both parties
    /// agreeing to that exact level.
    pub fn check_level_up(
        &self,
        snapshot: &ConnectionSnapshot,
        metrics: &InteractionMetrics,
        consent: Option<&ConsentState>,
    ) -> Result<LevelUpDecision, CoreError> {
        ensure_accepted(snapshot)?;
        if snapshot.trust_level.is_max() {
            return Ok(LevelUpDecision::AtCap);
        }
        let target = next_level(snapshot.trust_level);
        if !self.thresholds_met(target, metrics) {
            return Err(CoreError::InvalidState(reasons::REQUIREMENTS_NOT_MET.into()));
        }
        if self.requires_mutual_consent(target)
            && !consent.is_some_and(|c| c.target == target && c.is_mutual())
        {
            return Err(CoreError::Forbidden(reasons::MUTUAL_CONSENT_REQUIRED.into()));
        }
        Ok(LevelUpDecision::Advance(target))
    }

    /// `true` only when [`check_level_up`](Self::check_level_up) would advance.
    pub fn can_level_up(
        &self,
        snapshot: &ConnectionSnapshot,
        metrics: &InteractionMetrics,
        consent: Option<&ConsentState>,
    ) -> bool {
        matches!(
            self.check_level_up(snapshot, metrics, consent),
            Ok(LevelUpDecision::Advance(_))
        )
    }
}

impl Default for TrustLadder {
    fn default() -> Self {
        let level = |n: u8,
                     name: &str,
                     capabilities: Vec<Capability>,
                     requirements: LevelRequirements| LevelDefinition {
            level: TrustLevel(n),
            name: name.to_string(),
            capabilities,
            requirements,
        };

        Self {
            levels: vec![
                level(
                    1,
                    "Discovery",
                    vec![Capability::Discovery, Capability::LimitedText],
                    LevelRequirements::default(),
                ),
                level(
                    2,
                    "Verified Connection",
                    vec![Capability::TextChat],
                    LevelRequirements {
                        min_days_connected: 1,
                        min_messages: 10,
                        ..Default::default()
                    },
                ),
                level(
                    3,
                    "Voice",
                    vec![Capability::VoiceCall],
                    LevelRequirements {
                        min_days_connected: 3,
                        min_messages: 50,
                        mutual_consent: true,
                        ..Default::default()
                    },
                ),
                level(
                    4,
                    "Video",
                    vec![Capability::VideoCall],
                    LevelRequirements {
                        min_days_connected: 7,
                        min_voice_calls: 2,
                        mutual_consent: true,
                        ..Default::default()
                    },
                ),
                level(
                    5,
                    "In-Person",
                    vec![Capability::InPersonMeetup, Capability::SafetyCheckIn],
                    LevelRequirements {
                        min_days_connected: 14,
                        min_video_calls: 2,
                        mutual_consent: true,
                        ..Default::default()
                    },
                ),
            ],
        }
    }
}

fn ensure_accepted(snapshot: &ConnectionSnapshot) -> Result<(), CoreError> {
    if snapshot.status == ConnectionStatus::Accepted {
        Ok(())
    } else {
        Err(CoreError::InvalidState(reasons::NOT_ACCEPTED.into()))
    }
}

// ---------------------------------------------------------------------------
// Inputs and outcomes
// ---------------------------------------------------------------------------

/// The parts of a stored connection the state machine reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub trust_level: TrustLevel,
    pub accepted_at: Option<Timestamp>,
    pub message_count: i64,
    pub voice_call_count: i64,
    pub video_call_count: i64,
}

/// Interaction totals evaluated against level requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionMetrics {
    pub days_connected: i64,
    pub messages: i64,
    pub voice_calls: i64,
    pub video_calls: i64,
}

impl InteractionMetrics {
    /// Derive metrics from a snapshot as of `now`.
    pub fn from_snapshot(snapshot: &ConnectionSnapshot, now: Timestamp) -> Self {
        let days_connected = snapshot
            .accepted_at
            .map(|at| (now - at).num_days().max(0))
            .unwrap_or(0);
        Self {
            days_connected,
            messages: snapshot.message_count,
            voice_calls: snapshot.voice_call_count,
            video_calls: snapshot.video_call_count,
        }
    }
}

/// Which parties have proposed a given target level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentState {
    pub target: TrustLevel,
    pub consenting_users: BTreeSet<DbId>,
    pub participants: (DbId, DbId),
}

impl ConsentState {
    pub fn new(target: TrustLevel, participants: (DbId, DbId)) -> Self {
        Self {
            target,
            consenting_users: BTreeSet::new(),
            participants,
        }
    }

    pub fn with_consent(mut self, user_id: DbId) -> Self {
        if user_id == self.participants.0 || user_id == self.participants.1 {
            self.consenting_users.insert(user_id);
        }
        self
    }

    /// Both participants have consented.
    pub fn is_mutual(&self) -> bool {
        self.consenting_users.contains(&self.participants.0)
            && self.consenting_users.contains(&self.participants.1)
    }
}

/// Result of a successful eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelUpDecision {
    /// Move to this level.
    Advance(TrustLevel),
    /// Already at the top; nothing to do.
    AtCap,
}
