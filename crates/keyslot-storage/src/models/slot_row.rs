use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use keyslot_core::{AccessCode, LockId, PolicySettings, SlotRecord, SlotState};

/// One row of the `code_slots` table.
///
/// Columns are kept in their SQLite shapes: the state as lowercase text, the
/// policy as a JSON document and the code as an integer. Converting to a
/// [`SlotRecord`] validates all of them.
///
/// ```
/// use chrono::Utc;
/// use keyslot_core::{SlotRecord, SlotState};
/// use keyslot_storage::models::SlotRow;
///
/// let row = SlotRow {
///     lock_id: "lock.front_door".to_string(),
///     slot_index: 2,
///     state: "enabled".to_string(),
///     settings: Some(r#"{"enabled": true, "user_name": "Ana"}"#.to_string()),
///     desired_code: Some(4321),
///     usage_count: 7,
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
///
/// let record = SlotRecord::try_from(row).unwrap();
/// assert_eq!(record.state, SlotState::Enabled);
/// assert_eq!(record.settings.unwrap().user_name(), "Ana");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SlotRow {
    pub lock_id: String,
    pub slot_index: i64,
    pub state: String,
    /// Policy document as JSON; `NULL` when the slot has no policy
    pub settings: Option<String>,
    pub desired_code: Option<i64>,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlotRow {
    /// Column values of a record, ready to bind.
    ///
    /// # Errors
    /// Returns `StorageError::Serialization` if the settings cannot be
    /// encoded.
    pub fn columns(record: &SlotRecord) -> StorageResult<SlotColumns> {
        let settings = record
            .settings
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let desired_code = record
            .desired_code
            .map(|code| i64::try_from(code.value()))
            .transpose()
            .map_err(|e| {
                StorageError::invalid_record(record.lock_id.as_str(), record.slot_index.into(), e)
            })?;

        Ok(SlotColumns {
            lock_id: record.lock_id.as_str().to_string(),
            slot_index: i64::from(record.slot_index),
            state: record.state.as_str(),
            settings,
            desired_code,
            usage_count: i64::from(record.usage_count),
        })
    }
}

/// Bindable column values of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotColumns {
    pub lock_id: String,
    pub slot_index: i64,
    pub state: &'static str,
    pub settings: Option<String>,
    pub desired_code: Option<i64>,
    pub usage_count: i64,
}

impl TryFrom<SlotRow> for SlotRecord {
    type Error = StorageError;

    fn try_from(row: SlotRow) -> StorageResult<Self> {
        let invalid = |reason: &dyn ToString| {
            StorageError::invalid_record(row.lock_id.as_str(), row.slot_index, reason.to_string())
        };

        let lock_id = LockId::new(&row.lock_id).map_err(|e| invalid(&e))?;
        let slot_index = u16::try_from(row.slot_index).map_err(|e| invalid(&e))?;
        let state: SlotState = row.state.parse().map_err(|e| invalid(&e))?;
        let usage_count = u32::try_from(row.usage_count).map_err(|e| invalid(&e))?;

        let desired_code = row
            .desired_code
            .map(|value| {
                u64::try_from(value)
                    .map_err(|e| invalid(&e))
                    .and_then(|value| AccessCode::new(value).map_err(|e| invalid(&e)))
            })
            .transpose()?;

        let settings = row
            .settings
            .as_deref()
            .map(serde_json::from_str::<PolicySettings>)
            .transpose()?;

        Ok(SlotRecord {
            lock_id,
            slot_index,
            state,
            desired_code,
            usage_count,
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyslot_core::AccessCountRule;

    fn row() -> SlotRow {
        SlotRow {
            lock_id: "lock.front_door".to_string(),
            slot_index: 1,
            state: "disabled".to_string(),
            settings: None,
            desired_code: None,
            usage_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_columns_from_record() {
        let record = SlotRecord::new(LockId::new("lock.front_door").unwrap(), 3)
            .with_state(SlotState::Enabled)
            .with_desired_code(AccessCode::new(2580).unwrap())
            .with_usage_count(2)
            .with_settings(
                PolicySettings::new(true).with_access_count(AccessCountRule::new(true, 5)),
            );

        let columns = SlotRow::columns(&record).unwrap();
        assert_eq!(columns.slot_index, 3);
        assert_eq!(columns.state, "enabled");
        assert_eq!(columns.desired_code, Some(2580));
        assert_eq!(columns.usage_count, 2);

        let settings: serde_json::Value =
            serde_json::from_str(columns.settings.as_deref().unwrap()).unwrap();
        assert_eq!(settings["access_count"]["limit"], 5);
    }

    #[test]
    fn test_unknown_state_is_rejected() {
        let row = SlotRow {
            state: "half-open".to_string(),
            ..row()
        };
        assert!(matches!(
            SlotRecord::try_from(row),
            Err(StorageError::InvalidRecord { slot_index: 1, .. })
        ));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let negative_slot = SlotRow {
            slot_index: -1,
            ..row()
        };
        assert!(SlotRecord::try_from(negative_slot).is_err());

        let zero_code = SlotRow {
            desired_code: Some(0),
            ..row()
        };
        assert!(SlotRecord::try_from(zero_code).is_err());
    }

    #[test]
    fn test_malformed_settings_is_an_error() {
        let row = SlotRow {
            settings: Some("{not json".to_string()),
            ..row()
        };
        assert!(matches!(
            SlotRecord::try_from(row),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_invalid_settings_document_is_an_error() {
        let row = SlotRow {
            settings: Some(
                r#"{"enabled": true, "day_of_week": {"enabled": true, "days": {"funday": {"start_time": "09:00", "end_time": "17:00", "inclusive": true}}}}"#
                    .to_string(),
            ),
            ..row()
        };
        assert!(SlotRecord::try_from(row).is_err());
    }
}
