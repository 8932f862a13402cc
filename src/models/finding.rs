//! Finding domain models and DTOs.
//!
//! A "finding" is one recorded mechanical-inspection observation: checklist
//! metadata, equipment state, dates, personnel, a description, and optional
//! signature/attachment artifacts stored in object storage.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::finding;

/// Inspection type recorded when the client does not send one.
pub const DEFAULT_INSPECTION_TYPE: &str = "No especificado";

/// Maintenance type for a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum MaintenanceType {
    #[serde(rename = "PM1")]
    Pm1,
    #[serde(rename = "PM2")]
    Pm2,
}

impl MaintenanceType {
    /// Get maintenance type as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pm1 => "PM1",
            Self::Pm2 => "PM2",
        }
    }

    /// Parse maintenance type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PM1" => Some(Self::Pm1),
            "PM2" => Some(Self::Pm2),
            _ => None,
        }
    }
}

/// File selected in the form, held in memory until uploaded.
#[derive(Debug, Clone)]
pub struct DraftAttachment {
    /// Original filename from the client
    pub filename: String,
    /// Content type reported by the client, if any
    pub content_type: Option<String>,
    /// File contents
    pub data: Vec<u8>,
}

/// The in-progress, unsaved state of a finding being composed by a user.
///
/// Owned by one form session; discarded on successful submission. The
/// submission workflow never mutates it, so a failed submit can be retried
/// without retyping anything.
#[derive(Debug, Clone, Default)]
pub struct FindingDraft {
    pub checklist_name: String,
    pub equipment: String,
    /// Raw text from the form; must parse as an integer to validate.
    pub horometer: String,
    pub maintenance_type: Option<MaintenanceType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub supervisor: String,
    pub technician: String,
    pub description: String,
    /// Defaulted to [`DEFAULT_INSPECTION_TYPE`] when absent.
    pub inspection_type: Option<String>,
    /// Rendered signature image (PNG bytes). Empty bytes mean "not drawn".
    pub signature: Option<Vec<u8>>,
    pub attachment: Option<DraftAttachment>,
}

/// Typed values produced by a successful validation pass.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedFields {
    pub horometer: i64,
    pub maintenance_type: MaintenanceType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl FindingDraft {
    /// Check required fields, returning the typed values a record needs.
    ///
    /// On failure the message names the missing-fields condition; the draft
    /// is left untouched. Cross-field consistency (end_date >= start_date)
    /// is deliberately not checked.
    pub fn validate(&self) -> Result<ValidatedFields, String> {
        let mut missing = Vec::new();

        if self.checklist_name.trim().is_empty() {
            missing.push("checklist_name");
        }
        if self.equipment.trim().is_empty() {
            missing.push("equipment");
        }
        if self.horometer.trim().is_empty() {
            missing.push("horometer");
        }
        if self.maintenance_type.is_none() {
            missing.push("maintenance_type");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.supervisor.trim().is_empty() {
            missing.push("supervisor");
        }
        if self.technician.trim().is_empty() {
            missing.push("technician");
        }
        if self.start_date.is_none() {
            missing.push("start_date");
        }
        if self.end_date.is_none() {
            missing.push("end_date");
        }

        if !missing.is_empty() {
            return Err(format!("missing required fields: {}", missing.join(", ")));
        }

        let horometer = self
            .horometer
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("horometer '{}' is not a valid integer", self.horometer))?;

        Ok(ValidatedFields {
            horometer,
            // Checked above, so these cannot fail
            maintenance_type: self.maintenance_type.ok_or("maintenance_type")?,
            start_date: self.start_date.ok_or("start_date")?,
            end_date: self.end_date.ok_or("end_date")?,
        })
    }

    /// Signature bytes, if the drawing surface reported anything drawn.
    pub fn signature_bytes(&self) -> Option<&[u8]> {
        self.signature
            .as_deref()
            .filter(|bytes| !bytes.is_empty())
    }

    /// Inspection type, falling back to the recorded default.
    pub fn inspection_type_or_default(&self) -> &str {
        match self.inspection_type.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => DEFAULT_INSPECTION_TYPE,
        }
    }
}

/// A finding record ready to be inserted, built by the submission workflow
/// from a validated draft plus the uploaded artifact URLs.
///
/// Dates serialize as `YYYY-MM-DD` text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewFinding {
    pub checklist_name: String,
    pub equipment: String,
    pub horometer: i64,
    pub maintenance_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub supervisor: String,
    pub technician: String,
    pub description: String,
    pub inspection_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

impl NewFinding {
    /// Build the record from a validated draft and optional artifact URLs.
    pub fn from_draft(
        draft: &FindingDraft,
        fields: ValidatedFields,
        signature_url: Option<String>,
        file_url: Option<String>,
    ) -> Self {
        NewFinding {
            checklist_name: draft.checklist_name.clone(),
            equipment: draft.equipment.clone(),
            horometer: fields.horometer,
            maintenance_type: fields.maintenance_type.as_str().to_string(),
            start_date: fields.start_date,
            end_date: fields.end_date,
            supervisor: draft.supervisor.clone(),
            technician: draft.technician.clone(),
            description: draft.description.clone(),
            inspection_type: draft.inspection_type_or_default().to_string(),
            signature_url,
            file_url,
        }
    }
}

/// A persisted finding, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Finding {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub checklist_name: String,
    pub equipment: String,
    pub horometer: i64,
    pub maintenance_type: String,
    /// `YYYY-MM-DD`
    pub start_date: NaiveDate,
    /// `YYYY-MM-DD`
    pub end_date: NaiveDate,
    pub supervisor: String,
    pub technician: String,
    pub description: String,
    pub inspection_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

impl From<finding::Model> for Finding {
    fn from(model: finding::Model) -> Self {
        Finding {
            id: model.id,
            created_at: model.created_at,
            checklist_name: model.checklist_name,
            equipment: model.equipment,
            horometer: model.horometer,
            maintenance_type: model.maintenance_type,
            start_date: model.start_date,
            end_date: model.end_date,
            supervisor: model.supervisor,
            technician: model.technician,
            description: model.description,
            inspection_type: model.inspection_type,
            signature_url: model.signature_url,
            file_url: model.file_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_draft() -> FindingDraft {
        FindingDraft {
            checklist_name: "PM Checklist A".to_string(),
            equipment: "Excavator 12".to_string(),
            horometer: "4500".to_string(),
            maintenance_type: Some(MaintenanceType::Pm1),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 10),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 12),
            supervisor: "Juan Pérez".to_string(),
            technician: "Pedro López".to_string(),
            description: "Hose wear detected".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_passes_for_complete_draft() {
        let fields = valid_draft().validate().expect("draft should validate");
        assert_eq!(fields.horometer, 4500);
        assert_eq!(fields.maintenance_type, MaintenanceType::Pm1);
        assert_eq!(fields.start_date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(fields.end_date, NaiveDate::from_ymd_opt(2024, 1, 12).unwrap());
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let err = FindingDraft::default().validate().unwrap_err();
        assert!(err.starts_with("missing required fields:"));
        assert!(err.contains("checklist_name"));
        assert!(err.contains("end_date"));
    }

    #[test]
    fn test_validate_names_single_missing_field() {
        let mut draft = valid_draft();
        draft.description = "   ".to_string();
        let err = draft.validate().unwrap_err();
        assert_eq!(err, "missing required fields: description");
    }

    #[test]
    fn test_validate_rejects_non_integer_horometer() {
        let mut draft = valid_draft();
        draft.horometer = "45h".to_string();
        let err = draft.validate().unwrap_err();
        assert!(err.contains("not a valid integer"));
    }

    #[test]
    fn test_validate_does_not_order_dates() {
        // end_date before start_date is accepted; observed behavior never
        // checks cross-field ordering.
        let mut draft = valid_draft();
        draft.start_date = NaiveDate::from_ymd_opt(2024, 5, 20);
        draft.end_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_empty_signature_counts_as_not_drawn() {
        let mut draft = valid_draft();
        assert!(draft.signature_bytes().is_none());
        draft.signature = Some(Vec::new());
        assert!(draft.signature_bytes().is_none());
        draft.signature = Some(vec![0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(draft.signature_bytes().unwrap().len(), 4);
    }

    #[test]
    fn test_inspection_type_default() {
        let mut draft = valid_draft();
        assert_eq!(draft.inspection_type_or_default(), DEFAULT_INSPECTION_TYPE);
        draft.inspection_type = Some("".to_string());
        assert_eq!(draft.inspection_type_or_default(), DEFAULT_INSPECTION_TYPE);
        draft.inspection_type = Some("Mangueras".to_string());
        assert_eq!(draft.inspection_type_or_default(), "Mangueras");
    }

    #[test]
    fn test_maintenance_type_round_trip() {
        assert_eq!(MaintenanceType::parse("PM1"), Some(MaintenanceType::Pm1));
        assert_eq!(MaintenanceType::parse("PM2"), Some(MaintenanceType::Pm2));
        assert_eq!(MaintenanceType::parse("pm1"), None);
        assert_eq!(MaintenanceType::Pm2.as_str(), "PM2");
    }

    #[test]
    fn test_dates_serialize_as_plain_ymd() {
        let draft = valid_draft();
        let fields = draft.validate().unwrap();
        let record = NewFinding::from_draft(&draft, fields, None, None);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["start_date"], "2024-01-10");
        assert_eq!(json["end_date"], "2024-01-12");
        // Absent URLs are omitted entirely
        assert!(json.get("signature_url").is_none());
        assert!(json.get("file_url").is_none());
    }
}
