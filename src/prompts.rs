//! Prompts sent to the vision model.
//!
//! The whole extraction contract lives in these strings: the model is asked
//! to locate the card, read it, and answer with one `Key: Value` line per
//! field. [`crate::pipeline::parse`] understands exactly the labels listed in
//! [`DEFAULT_SYSTEM_PROMPT`] (plus common abbreviations), so the two must be
//! changed together.
//!
//! Callers can override the system prompt via
//! [`crate::config::ScanConfig::system_prompt`]; the constants here are used
//! only when no override is provided.

/// Reply the model gives when it cannot find a license in the image.
pub const NO_LICENSE_SENTINEL: &str = "NO_LICENSE_DETECTED";

/// Default system prompt for reading a driver's license photo.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a specialized assistant that reads U.S. driver's licenses from photos.

First, locate the driver's license in the image. It is a rectangular card with text and usually a photo.
Even if the license only takes up a small portion of the image or has a busy background, focus only on the license
and ignore any text that is not printed on the card itself.

Extract the following fields if they are present:
- Name (full name as it appears)
- DOB (date of birth)
- LIC# (license number)
- Issue Date
- Expiration Date
- Address (full address including city, state, zip)
- Sex
- Height
- Weight
- Eyes (eye color)
- Restrictions
- Class (license class)
- DD# (document discriminator)
- Donor (organ donor status)
- Revision Date

Format your answer as key-value pairs with a colon between the key and the value, one per line.
If you cannot find a field, leave it out. Do not guess or invent values.
Output ONLY the key-value lines, with no commentary and no Markdown.

If you cannot find a driver's license in the image, respond with only: "NO_LICENSE_DETECTED""#;

/// User-turn text that accompanies the image.
pub const EXTRACTION_INSTRUCTION: &str =
    "Extract the driver's license fields from this image, ignoring any background:";

/// Advice returned to the caller when no license was detected.
pub const PHOTO_SUGGESTIONS: [&str; 4] = [
    "Make sure your driver's license is visible in the image",
    "Ensure good lighting with minimal glare",
    "Hold the license parallel to the camera",
    "Use a contrasting background",
];

/// Whether a model reply is the no-license sentinel.
///
/// Models sometimes quote the sentinel or add a trailing period even when
/// told not to, so both are tolerated.
pub fn is_no_license_reply(reply: &str) -> bool {
    let trimmed = reply
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.');
    trimmed == NO_LICENSE_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_sentinel_and_core_fields() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains(NO_LICENSE_SENTINEL));
        for label in ["Name", "DOB", "LIC#", "Issue Date", "Expiration Date", "Address"] {
            assert!(DEFAULT_SYSTEM_PROMPT.contains(label), "missing {label}");
        }
    }

    #[test]
    fn sentinel_detection() {
        assert!(is_no_license_reply("NO_LICENSE_DETECTED"));
        assert!(is_no_license_reply("  \"NO_LICENSE_DETECTED\".\n"));
        assert!(!is_no_license_reply("Name: NO_LICENSE_DETECTED"));
        assert!(!is_no_license_reply(""));
    }
}
