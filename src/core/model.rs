use super::error::{RecorderError, Result};
use crate::catalog::{
    APP_NAME_FIELD, DIASTOLIC_FIELD, PULSE_FIELD, RECORDED_FIELD, SYSTOLIC_FIELD,
};
use crate::interface::{ALLOWED_CHILD_TYPES_FIELD, ContentObject, DISPLAY_NAME_FIELD};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Format of record names, second precision UTC.
pub const RECORD_NAME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The application root that owns every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: Option<u64>,
    pub path: String,
    pub display_name: String,
    pub allowed_child_types: BTreeSet<String>,
}

impl Container {
    pub fn from_object(object: &ContentObject) -> Self {
        let display_name = object
            .str_field(APP_NAME_FIELD)
            .or_else(|| object.str_field(DISPLAY_NAME_FIELD))
            .unwrap_or(&object.name)
            .to_string();

        Self {
            id: object.id,
            path: object.path(),
            display_name,
            allowed_child_types: object
                .string_list_field(ALLOWED_CHILD_TYPES_FIELD)
                .into_iter()
                .collect(),
        }
    }

    pub fn accepts(&self, type_name: &str) -> bool {
        self.allowed_child_types.contains(type_name)
    }
}

/// One measurement.
///
/// Values are raw user input; no range checks are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub recorded_at: DateTime<Utc>,
    pub systolic: i32,
    pub diastolic: i32,
    pub pulse: i32,
}

impl Record {
    /// Creates a record, dropping sub-second precision from `recorded_at`.
    pub fn new(recorded_at: DateTime<Utc>, systolic: i32, diastolic: i32, pulse: i32) -> Self {
        Self {
            recorded_at: recorded_at.trunc_subsecs(0),
            systolic,
            diastolic,
            pulse,
        }
    }

    /// Builds a record from text inputs; unparsable values become 0.
    pub fn from_input(
        recorded_at: DateTime<Utc>,
        systolic: &str,
        diastolic: &str,
        pulse: &str,
    ) -> Self {
        Self::new(
            recorded_at,
            parse_or_zero(systolic),
            parse_or_zero(diastolic),
            parse_or_zero(pulse),
        )
    }

    pub fn now(systolic: i32, diastolic: i32, pulse: i32) -> Self {
        Self::new(Utc::now(), systolic, diastolic, pulse)
    }

    /// Content name derived from the timestamp: `YYYY-MM-DD HH:MM:SS`.
    pub fn name(&self) -> String {
        self.recorded_at.format(RECORD_NAME_FORMAT).to_string()
    }

    pub fn apply_to(&self, object: &mut ContentObject) {
        object.set_field(
            RECORDED_FIELD,
            self.recorded_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        object.set_field(SYSTOLIC_FIELD, self.systolic);
        object.set_field(DIASTOLIC_FIELD, self.diastolic);
        object.set_field(PULSE_FIELD, self.pulse);
    }

    /// Maps a queried content object back into a record.
    ///
    /// `Recorded` is required; missing measurement fields read as 0.
    pub fn from_object(object: &ContentObject) -> Result<Self> {
        let recorded = object.str_field(RECORDED_FIELD).ok_or_else(|| {
            RecorderError::MalformedResult(format!(
                "'{}' has no {} value",
                object.path(),
                RECORDED_FIELD
            ))
        })?;
        let recorded_at = DateTime::parse_from_rfc3339(recorded)
            .map_err(|e| {
                RecorderError::MalformedResult(format!(
                    "'{}' has invalid {} '{}': {}",
                    object.path(),
                    RECORDED_FIELD,
                    recorded,
                    e
                ))
            })?
            .with_timezone(&Utc);

        Ok(Self::new(
            recorded_at,
            int_field(object, SYSTOLIC_FIELD)?,
            int_field(object, DIASTOLIC_FIELD)?,
            int_field(object, PULSE_FIELD)?,
        ))
    }
}

fn parse_or_zero(input: &str) -> i32 {
    input.trim().parse().unwrap_or(0)
}

fn int_field(object: &ContentObject, name: &str) -> Result<i32> {
    match object.field(name) {
        None | Some(serde_json::Value::Null) => Ok(0),
        Some(value) => value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| {
                RecorderError::MalformedResult(format!(
                    "'{}' has non-integer {} value {}",
                    object.path(),
                    name,
                    value
                ))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_record_name_uses_second_precision() {
        let time = at(10, 0, 0) + chrono::Duration::milliseconds(750);
        let record = Record::new(time, 120, 80, 60);
        assert_eq!(record.name(), "2024-01-01 10:00:00");
        assert_eq!(record.recorded_at, at(10, 0, 0));
    }

    #[test]
    fn test_from_input_defaults_to_zero() {
        let record = Record::from_input(at(8, 30, 0), " 135 ", "abc", "");
        assert_eq!(record.systolic, 135);
        assert_eq!(record.diastolic, 0);
        assert_eq!(record.pulse, 0);
    }

    #[test]
    fn test_object_mapping() {
        let record = Record::new(at(10, 0, 0), 120, 80, 60);
        let mut object = ContentObject::new("/Root/Content/Apps/BPR-V0_1", "BloodPressure", &record.name());
        record.apply_to(&mut object);

        assert_eq!(object.field(RECORDED_FIELD), Some(&json!("2024-01-01T10:00:00Z")));
        assert_eq!(Record::from_object(&object).unwrap(), record);
    }

    #[test]
    fn test_from_object_rejects_missing_timestamp() {
        let mut object = ContentObject::new("/Root/Content/Apps/BPR-V0_1", "BloodPressure", "x");
        object.set_field(SYSTOLIC_FIELD, 120);
        let err = Record::from_object(&object).unwrap_err();
        assert!(matches!(err, RecorderError::MalformedResult(_)));
    }

    #[test]
    fn test_from_object_missing_measurements_read_as_zero() {
        let mut object = ContentObject::new("/Root/Content/Apps/BPR-V0_1", "BloodPressure", "x");
        object.set_field(RECORDED_FIELD, "2024-01-01T10:00:00Z");
        object.set_field(PULSE_FIELD, serde_json::Value::Null);
        let record = Record::from_object(&object).unwrap();
        assert_eq!((record.systolic, record.diastolic, record.pulse), (0, 0, 0));

        object.set_field(SYSTOLIC_FIELD, "high");
        assert!(Record::from_object(&object).is_err());
    }

    #[test]
    fn test_container_from_object() {
        let mut object = ContentObject::new("/Root/Content/Apps", "ClientApplicationFolderV0_1", "BPR-V0_1");
        object.id = Some(7);
        object.set_field(APP_NAME_FIELD, "Blood Pressure Recorder");
        object.set_field(ALLOWED_CHILD_TYPES_FIELD, json!(["Folder", "BloodPressure"]));

        let container = Container::from_object(&object);
        assert_eq!(container.path, "/Root/Content/Apps/BPR-V0_1");
        assert_eq!(container.display_name, "Blood Pressure Recorder");
        assert!(container.accepts("BloodPressure"));
        assert!(!container.accepts("File"));
    }
}
