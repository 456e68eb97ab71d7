use crate::{
    Result,
    constants::{MAX_CODE_DIGITS, MAX_LOCK_ID_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Identifier of a managed lock (e.g. `lock.front_door`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LockId(String);

impl LockId {
    /// Create a lock identifier with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidLockId` if the identifier is empty, longer than
    /// 255 bytes, not ASCII, or contains whitespace.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();

        if id.is_empty() {
            return Err(Error::InvalidLockId("lock id must not be empty".to_string()));
        }

        if id.len() > MAX_LOCK_ID_LENGTH {
            return Err(Error::InvalidLockId(format!(
                "lock id must be at most {MAX_LOCK_ID_LENGTH} bytes, got {}",
                id.len()
            )));
        }

        if !id.is_ascii() || id.chars().any(char::is_whitespace) {
            return Err(Error::InvalidLockId(format!(
                "lock id must be ASCII without whitespace: {id:?}"
            )));
        }

        Ok(LockId(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for LockId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LockId::new(s)
    }
}

impl TryFrom<String> for LockId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        LockId::new(&value)
    }
}

impl From<LockId> for String {
    fn from(id: LockId) -> Self {
        id.0
    }
}

/// Numeric PIN programmed into a lock slot.
///
/// Zero is not a valid code: locks report a cleared slot as zeros or NUL
/// bytes, so a zero reading is treated as "no code".
///
/// # Security
/// Comparison is constant-time and `Debug` output is redacted so codes do
/// not leak into logs.
#[derive(Clone, Copy, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct AccessCode(u64);

impl AccessCode {
    /// Create an access code with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidCode` if the code is zero or longer than
    /// 10 digits.
    pub fn new(code: u64) -> Result<Self> {
        if code == 0 {
            return Err(Error::InvalidCode("code must not be zero".to_string()));
        }

        if code >= 10u64.pow(MAX_CODE_DIGITS) {
            return Err(Error::InvalidCode(format!(
                "code must be at most {MAX_CODE_DIGITS} digits"
            )));
        }

        Ok(AccessCode(code))
    }

    /// Parse the raw text a lock reports for a slot.
    ///
    /// NUL padding and surrounding whitespace are stripped. Anything that is
    /// not a plain run of digits, or that reads as zero, yields `None`.
    ///
    /// ```
    /// use keyslot_core::AccessCode;
    ///
    /// assert_eq!(AccessCode::parse_observed("1234\0\0").map(|c| c.value()), Some(1234));
    /// assert!(AccessCode::parse_observed("0000").is_none());
    /// assert!(AccessCode::parse_observed("****").is_none());
    /// assert!(AccessCode::parse_observed("").is_none());
    /// ```
    #[must_use]
    pub fn parse_observed(raw: &str) -> Option<Self> {
        let cleaned: String = raw.chars().filter(|c| *c != '\0').collect();
        let cleaned = cleaned.trim();

        if cleaned.is_empty() || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        cleaned.parse::<u64>().ok().and_then(|v| AccessCode::new(v).ok())
    }

    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl PartialEq for AccessCode {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_be_bytes().ct_eq(&other.0.to_be_bytes()).into()
    }
}

impl fmt::Debug for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AccessCode(****)")
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for AccessCode {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self> {
        AccessCode::new(value)
    }
}

impl From<AccessCode> for u64 {
    fn from(code: AccessCode) -> Self {
        code.0
    }
}

/// Lifecycle state of a code slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// No code should be on the lock. Initial state of every slot.
    Disabled,

    /// The slot's desired code should be on the lock.
    Enabled,

    /// The lock disagrees with the slot; a corrective write is pending.
    Dirty,

    /// An invalid transition was requested.
    Unknown,
}

impl SlotState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Disabled => "disabled",
            SlotState::Enabled => "enabled",
            SlotState::Dirty => "dirty",
            SlotState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SlotState::Disabled => write!(f, "Disabled"),
            SlotState::Enabled => write!(f, "Enabled"),
            SlotState::Dirty => write!(f, "Dirty"),
            SlotState::Unknown => write!(f, "Unknown"),
        }
    }
}

impl std::str::FromStr for SlotState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" => Ok(SlotState::Disabled),
            "enabled" => Ok(SlotState::Enabled),
            "dirty" => Ok(SlotState::Dirty),
            "unknown" => Ok(SlotState::Unknown),
            _ => Err(Error::UnknownState(s.to_string())),
        }
    }
}

/// Contiguous range of slot indexes managed on one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SlotRangeFields")]
pub struct SlotRange {
    start: u16,
    count: u16,
}

/// Unchecked serde form of [`SlotRange`].
#[derive(Deserialize)]
struct SlotRangeFields {
    start: u16,
    count: u16,
}

impl TryFrom<SlotRangeFields> for SlotRange {
    type Error = Error;

    fn try_from(fields: SlotRangeFields) -> Result<Self> {
        SlotRange::new(fields.start, fields.count)
    }
}

impl SlotRange {
    /// Create a slot range of `count` slots starting at `start`.
    ///
    /// # Errors
    /// Returns `Error::InvalidSlotRange` if `count` is zero or the range would
    /// run past `u16::MAX`.
    pub fn new(start: u16, count: u16) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidSlotRange(
                "slot count must be at least 1".to_string(),
            ));
        }

        if start.checked_add(count - 1).is_none() {
            return Err(Error::InvalidSlotRange(format!(
                "{count} slots starting at {start} overflow the slot index space"
            )));
        }

        Ok(SlotRange { start, count })
    }

    #[must_use]
    pub fn start(&self) -> u16 {
        self.start
    }

    #[must_use]
    pub fn count(&self) -> u16 {
        self.count
    }

    /// Last slot index in the range (inclusive).
    #[must_use]
    pub fn end(&self) -> u16 {
        self.start.saturating_add(self.count.saturating_sub(1))
    }

    #[must_use]
    pub fn contains(&self, index: u16) -> bool {
        (self.start..=self.end()).contains(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end()
    }
}

impl Default for SlotRange {
    fn default() -> Self {
        SlotRange {
            start: crate::constants::DEFAULT_START_SLOT,
            count: crate::constants::DEFAULT_SLOT_COUNT,
        }
    }
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("lock.front_door")]
    #[case("  lock.garage  ")]
    #[case("zwave_node_12")]
    fn test_lock_id_valid(#[case] input: &str) {
        let id: LockId = input.parse().unwrap();
        assert_eq!(id.as_str(), input.trim());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("lock.front door")]
    #[case("lock.pörta")]
    fn test_lock_id_invalid(#[case] input: &str) {
        assert!(LockId::new(input).is_err());
    }

    #[test]
    fn test_lock_id_too_long() {
        let long = "a".repeat(MAX_LOCK_ID_LENGTH + 1);
        assert!(LockId::new(&long).is_err());
    }

    #[rstest]
    #[case("1234", Some(1234))]
    #[case("1234\0\0\0\0", Some(1234))]
    #[case(" 5678 ", Some(5678))]
    #[case("0000", None)]
    #[case("\0\0\0\0", None)]
    #[case("", None)]
    #[case("12a4", None)]
    #[case("-123", None)]
    #[case("99999999999", None)]
    fn test_access_code_parse_observed(#[case] raw: &str, #[case] expected: Option<u64>) {
        assert_eq!(
            AccessCode::parse_observed(raw).map(|c| c.value()),
            expected
        );
    }

    #[test]
    fn test_access_code_rejects_zero() {
        assert!(AccessCode::new(0).is_err());
    }

    #[test]
    fn test_access_code_debug_is_redacted() {
        let code = AccessCode::new(4321).unwrap();
        assert!(!format!("{code:?}").contains("4321"));
        assert_eq!(code.to_string(), "4321");
    }

    #[test]
    fn test_access_code_equality() {
        assert_eq!(AccessCode::new(1234).unwrap(), AccessCode::new(1234).unwrap());
        assert_ne!(AccessCode::new(1234).unwrap(), AccessCode::new(1235).unwrap());
    }

    #[test]
    fn test_access_code_serde_rejects_zero() {
        assert!(serde_json::from_str::<AccessCode>("0").is_err());
        let code: AccessCode = serde_json::from_str("1234").unwrap();
        assert_eq!(code.value(), 1234);
    }

    #[rstest]
    #[case("enabled", SlotState::Enabled)]
    #[case("Disabled", SlotState::Disabled)]
    #[case("DIRTY", SlotState::Dirty)]
    #[case("unknown", SlotState::Unknown)]
    fn test_slot_state_from_str(#[case] input: &str, #[case] expected: SlotState) {
        assert_eq!(input.parse::<SlotState>().unwrap(), expected);
    }

    #[test]
    fn test_slot_state_from_str_invalid() {
        assert!("locked".parse::<SlotState>().is_err());
    }

    #[test]
    fn test_slot_range() {
        let range = SlotRange::new(1, 10).unwrap();
        assert_eq!(range.end(), 10);
        assert!(range.contains(1));
        assert!(range.contains(10));
        assert!(!range.contains(0));
        assert!(!range.contains(11));
        assert_eq!(range.iter().count(), 10);
        assert_eq!(range.to_string(), "1..=10");
    }

    #[test]
    fn test_slot_range_invalid() {
        assert!(SlotRange::new(1, 0).is_err());
        assert!(SlotRange::new(u16::MAX, 2).is_err());
        assert!(SlotRange::new(u16::MAX, 1).is_ok());
    }

    #[rstest]
    #[case(r#"{"start":1,"count":0}"#)]
    #[case(r#"{"start":65535,"count":2}"#)]
    fn test_slot_range_serde_rejects_invalid(#[case] json: &str) {
        assert!(serde_json::from_str::<SlotRange>(json).is_err());
    }

    #[test]
    fn test_slot_range_serde() {
        let range: SlotRange = serde_json::from_str(r#"{"start":3,"count":4}"#).unwrap();
        assert_eq!(range, SlotRange::new(3, 4).unwrap());
        assert_eq!(serde_json::to_string(&range).unwrap(), r#"{"start":3,"count":4}"#);
    }
}
