//! Result types returned by a scan.

use serde::{Deserialize, Serialize};

/// Fields read off a driver's license.
///
/// Every field is optional: a blurry or partial photo legitimately yields
/// gaps, and values are passed through exactly as the model wrote them (no
/// date or checksum validation). Anything in the reply that could not be
/// mapped to a field is kept verbatim in [`raw_text`](Self::raw_text).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    // Secondary card fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organ_donor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_date: Option<String>,

    /// Reply text that did not map to any field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl ExtractionResult {
    /// Number of the six core fields (name, DOB, number, issue, expiry,
    /// address) that were populated.
    pub fn core_field_count(&self) -> usize {
        [
            &self.name,
            &self.date_of_birth,
            &self.license_number,
            &self.issue_date,
            &self.expiration_date,
            &self.address,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
    }

    /// True when no field at all (core or secondary) was recognised.
    pub fn is_unstructured(&self) -> bool {
        self.core_field_count() == 0
            && [
                &self.sex,
                &self.height,
                &self.weight,
                &self.eye_color,
                &self.restrictions,
                &self.license_class,
                &self.document_discriminator,
                &self.organ_donor,
                &self.revision_date,
            ]
            .iter()
            .all(|f| f.is_none())
    }
}

/// Timing and token accounting for one scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Wall-clock time spent waiting on the vision API.
    pub extraction_ms: u64,
    /// Wall-clock time for the whole scan, parsing included.
    pub total_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Everything a scan produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutput {
    /// Parsed license fields.
    pub result: ExtractionResult,
    /// The model's reply, verbatim.
    pub response_text: String,
    /// Which backend/model answered, e.g. `openai/gpt-4o`.
    pub model: String,
    pub stats: ScanStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_serialises_to_empty_object() {
        let json = serde_json::to_string(&ExtractionResult::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn core_field_count_ignores_secondary_fields() {
        let r = ExtractionResult {
            name: Some("JANE DOE".into()),
            sex: Some("F".into()),
            ..Default::default()
        };
        assert_eq!(r.core_field_count(), 1);
        assert!(!r.is_unstructured());
    }

    #[test]
    fn secondary_only_is_not_unstructured() {
        let r = ExtractionResult {
            height: Some("5-06".into()),
            ..Default::default()
        };
        assert_eq!(r.core_field_count(), 0);
        assert!(!r.is_unstructured());
        assert!(ExtractionResult::default().is_unstructured());
    }
}
