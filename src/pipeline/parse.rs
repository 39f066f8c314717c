//! Reply parsing: model text → [`ExtractionResult`].
//!
//! The prompt asks for `Key: Value` lines, and well-behaved models comply.
//! The rules below tolerate the usual deviations without trying to be clever
//! about prose:
//!
//! 1. An outer Markdown code fence is stripped; CRLF becomes LF.
//! 2. Each non-empty line loses list markers (`-`, `*`, `•`, `1.`) and
//!    `**`/`__` emphasis, then splits at its first `:`.
//! 3. The label is normalised (case, punctuation, a leading card field code
//!    such as `4d`) and looked up in the alias table. A parenthetical like
//!    `LIC# (License Number)` is tried on both sides.
//! 4. A known label with a non-empty value fills its field; the first
//!    occurrence wins.
//! 5. Every other line is kept verbatim, in order, in `raw_text`.
//! 6. If nothing was recognised, `raw_text` is the whole reply.

use crate::output::ExtractionResult;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// A field the parser knows how to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    DateOfBirth,
    LicenseNumber,
    IssueDate,
    ExpirationDate,
    Address,
    Sex,
    Height,
    Weight,
    EyeColor,
    Restrictions,
    LicenseClass,
    DocumentDiscriminator,
    OrganDonor,
    RevisionDate,
}

impl Field {
    /// Map a reply label (`"DOB"`, `"LIC# (License Number)"`, `"4b EXP"`) to a field.
    pub fn from_label(label: &str) -> Option<Field> {
        if let Some(field) = Self::lookup(&normalise_label(label)) {
            return Some(field);
        }
        let caps = RE_PARENTHETICAL.captures(label.trim())?;
        Self::lookup(&normalise_label(&caps[1])).or_else(|| Self::lookup(&normalise_label(&caps[2])))
    }

    fn lookup(key: &str) -> Option<Field> {
        let field = match key {
            "name" | "full name" | "names" | "licensee" | "licensee name" => Field::Name,
            "dob" | "date of birth" | "birth date" | "birthdate" | "born" => Field::DateOfBirth,
            "lic#" | "lic" | "lic no" | "license number" | "license no" | "license#"
            | "licence number" | "license id" | "dl" | "dl#" | "dl no" | "dln"
            | "drivers license number" | "driver license number" => Field::LicenseNumber,
            "issue date" | "issued" | "iss" | "date issued" | "issue" => Field::IssueDate,
            "expiration date" | "expiration" | "expires" | "exp" | "exp date" | "expiry"
            | "expiry date" => Field::ExpirationDate,
            "address" | "addr" | "full address" | "residence address" | "mailing address" => {
                Field::Address
            }
            "sex" | "gender" => Field::Sex,
            "height" | "hgt" | "ht" => Field::Height,
            "weight" | "wgt" | "wt" => Field::Weight,
            "eyes" | "eye" | "eye color" | "eye colour" => Field::EyeColor,
            "restrictions" | "restriction" | "rstr" | "restr" => Field::Restrictions,
            "class" | "license class" | "lic class" => Field::LicenseClass,
            "dd" | "dd#" | "dd number" | "document discriminator"
            | "document discriminator number" => Field::DocumentDiscriminator,
            "donor" | "organ donor" | "donor status" => Field::OrganDonor,
            "revision date" | "rev" | "rev date" | "revised" => Field::RevisionDate,
            _ => return None,
        };
        Some(field)
    }

    fn slot(self, result: &mut ExtractionResult) -> &mut Option<String> {
        match self {
            Field::Name => &mut result.name,
            Field::DateOfBirth => &mut result.date_of_birth,
            Field::LicenseNumber => &mut result.license_number,
            Field::IssueDate => &mut result.issue_date,
            Field::ExpirationDate => &mut result.expiration_date,
            Field::Address => &mut result.address,
            Field::Sex => &mut result.sex,
            Field::Height => &mut result.height,
            Field::Weight => &mut result.weight,
            Field::EyeColor => &mut result.eye_color,
            Field::Restrictions => &mut result.restrictions,
            Field::LicenseClass => &mut result.license_class,
            Field::DocumentDiscriminator => &mut result.document_discriminator,
            Field::OrganDonor => &mut result.organ_donor,
            Field::RevisionDate => &mut result.revision_date,
        }
    }
}

/// Parse a model reply into license fields.
pub fn parse_reply(reply: &str) -> ExtractionResult {
    let text = normalise_reply(reply);
    let mut result = ExtractionResult::default();
    let mut leftovers: Vec<&str> = Vec::new();
    let mut recognised = 0usize;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match parse_line(line) {
            Some((field, value)) => {
                let slot = field.slot(&mut result);
                if slot.is_none() {
                    debug!("Parsed field: {:?} = {}", field, value);
                    *slot = Some(value);
                    recognised += 1;
                } else {
                    leftovers.push(line);
                }
            }
            None => leftovers.push(line),
        }
    }

    if recognised == 0 {
        let whole = reply.trim();
        if !whole.is_empty() {
            result.raw_text = Some(whole.to_string());
        }
    } else if !leftovers.is_empty() {
        result.raw_text = Some(leftovers.join("\n"));
    }

    result
}

/// Split one reply line into a known field and its value.
fn parse_line(line: &str) -> Option<(Field, String)> {
    let line = RE_LIST_MARKER.replace(line, "");
    let line = line.replace("**", "").replace("__", "");
    let (label, value) = line.split_once(':')?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let field = Field::from_label(label)?;
    Some((field, value.to_string()))
}

// ── Normalisation ───────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```\s*$").unwrap());

static RE_LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d{1,2}[.)])\s+").unwrap());

static RE_FIELD_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}[a-z]?\s+").unwrap());

static RE_PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\(([^)]*)\)\s*$").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn normalise_reply(reply: &str) -> String {
    let unified = reply.replace("\r\n", "\n").replace('\r', "\n");
    match RE_OUTER_FENCES.captures(unified.trim()) {
        Some(caps) => caps[1].to_string(),
        None => unified,
    }
}

/// `"  Driver's-License_No. "` → `"drivers license no"`, `"LIC #"` → `"lic#"`,
/// `"D.O.B."` → `"dob"`.
fn normalise_label(label: &str) -> String {
    let lowered: String = label
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'' && *c != '’')
        .map(|c| if matches!(c, '.' | '_' | '-' | '/') { ' ' } else { c })
        .collect();
    let collapsed = join_initials(&RE_WHITESPACE.replace_all(lowered.trim(), " ")).replace(" #", "#");
    match RE_FIELD_CODE.find(&collapsed) {
        Some(m) if m.end() < collapsed.len() => collapsed[m.end()..].to_string(),
        _ => collapsed,
    }
}

/// Glue runs of single letters back together: `"d o b"` → `"dob"`.
fn join_initials(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut prev_initial = false;
    for word in label.split(' ') {
        let mut chars = word.chars();
        let initial = matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic());
        if !out.is_empty() && !(initial && prev_initial) {
            out.push(' ');
        }
        out.push_str(word);
        prev_initial = initial;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "Name: JANE Q DOE\n\
        DOB: 01/02/1985\n\
        LIC#: D1234567\n\
        Issue Date: 03/04/2020\n\
        Expiration Date: 01/02/2028\n\
        Address: 123 MAIN ST, SPRINGFIELD, IL 62701";

    #[test]
    fn all_six_fields_no_fallback() {
        let r = parse_reply(WELL_FORMED);
        assert_eq!(r.name.as_deref(), Some("JANE Q DOE"));
        assert_eq!(r.date_of_birth.as_deref(), Some("01/02/1985"));
        assert_eq!(r.license_number.as_deref(), Some("D1234567"));
        assert_eq!(r.issue_date.as_deref(), Some("03/04/2020"));
        assert_eq!(r.expiration_date.as_deref(), Some("01/02/2028"));
        assert_eq!(r.address.as_deref(), Some("123 MAIN ST, SPRINGFIELD, IL 62701"));
        assert_eq!(r.core_field_count(), 6);
        assert_eq!(r.raw_text, None);
    }

    #[test]
    fn unstructured_reply_goes_to_raw_text() {
        let reply = "I can see a card, but the text is too blurry to read.\nPlease retake the photo.";
        let r = parse_reply(reply);
        assert!(r.is_unstructured());
        assert_eq!(r.raw_text.as_deref(), Some(reply));
    }

    #[test]
    fn unknown_labels_are_kept_verbatim() {
        let reply = "Here is the information:\nName: JOHN SMITH\nCountry: USA\nDOB: 1990-05-06";
        let r = parse_reply(reply);
        assert_eq!(r.name.as_deref(), Some("JOHN SMITH"));
        assert_eq!(r.date_of_birth.as_deref(), Some("1990-05-06"));
        assert_eq!(
            r.raw_text.as_deref(),
            Some("Here is the information:\nCountry: USA")
        );
    }

    #[test]
    fn value_keeps_later_colons() {
        let r = parse_reply("Address: 1 Elm St: Apt 2, Austin, TX");
        assert_eq!(r.address.as_deref(), Some("1 Elm St: Apt 2, Austin, TX"));
    }

    #[test]
    fn markdown_decoration_is_tolerated() {
        let reply = "```text\n- **Name:** ALEX ROE\n* **LIC# (License Number):** X99\n1. Expiration Date: 2030-01-01\n```";
        let r = parse_reply(reply);
        assert_eq!(r.name.as_deref(), Some("ALEX ROE"));
        assert_eq!(r.license_number.as_deref(), Some("X99"));
        assert_eq!(r.expiration_date.as_deref(), Some("2030-01-01"));
        assert_eq!(r.raw_text, None);
    }

    #[test]
    fn card_field_codes_and_abbreviations() {
        let reply = "4d DLN: 123-456-789\n4a ISS: 05/05/2021\n4b EXP: 05/05/2029\n3 DOB: 07/08/1970";
        let r = parse_reply(reply);
        assert_eq!(r.license_number.as_deref(), Some("123-456-789"));
        assert_eq!(r.issue_date.as_deref(), Some("05/05/2021"));
        assert_eq!(r.expiration_date.as_deref(), Some("05/05/2029"));
        assert_eq!(r.date_of_birth.as_deref(), Some("07/08/1970"));
    }

    #[test]
    fn secondary_fields() {
        let reply = "Sex: F\nHgt: 5'-06\"\nWgt: 130 lb\nEyes: BRO\nClass: C\nDD#: 0012345\nDonor: Yes\nRestrictions: NONE\nRev: 08/2019";
        let r = parse_reply(reply);
        assert_eq!(r.sex.as_deref(), Some("F"));
        assert_eq!(r.height.as_deref(), Some("5'-06\""));
        assert_eq!(r.weight.as_deref(), Some("130 lb"));
        assert_eq!(r.eye_color.as_deref(), Some("BRO"));
        assert_eq!(r.license_class.as_deref(), Some("C"));
        assert_eq!(r.document_discriminator.as_deref(), Some("0012345"));
        assert_eq!(r.organ_donor.as_deref(), Some("Yes"));
        assert_eq!(r.restrictions.as_deref(), Some("NONE"));
        assert_eq!(r.revision_date.as_deref(), Some("08/2019"));
        assert_eq!(r.core_field_count(), 0);
        assert_eq!(r.raw_text, None);
    }

    #[test]
    fn first_occurrence_wins() {
        let r = parse_reply("Name: FIRST\nName: SECOND");
        assert_eq!(r.name.as_deref(), Some("FIRST"));
        assert_eq!(r.raw_text.as_deref(), Some("Name: SECOND"));
    }

    #[test]
    fn empty_value_is_not_a_field() {
        let r = parse_reply("Name: KIM LEE\nAddress:");
        assert_eq!(r.address, None);
        assert_eq!(r.raw_text.as_deref(), Some("Address:"));
    }

    #[test]
    fn crlf_and_blank_lines() {
        let r = parse_reply("Name: A B\r\n\r\nDOB: 1/1/2000\r\n");
        assert_eq!(r.name.as_deref(), Some("A B"));
        assert_eq!(r.date_of_birth.as_deref(), Some("1/1/2000"));
        assert_eq!(r.raw_text, None);
    }

    #[test]
    fn empty_reply() {
        assert_eq!(parse_reply("  \n"), ExtractionResult::default());
    }

    #[test]
    fn label_normalisation() {
        assert_eq!(normalise_label("  Driver's-License_No. "), "drivers license no");
        assert_eq!(normalise_label("LIC #"), "lic#");
        assert_eq!(normalise_label("4d DLN"), "dln");
        assert_eq!(normalise_label("12"), "12");
        assert_eq!(Field::from_label("Eyes (Eye color)"), Some(Field::EyeColor));
        assert_eq!(Field::from_label("Date Issued"), Some(Field::IssueDate));
        assert_eq!(Field::from_label("Favourite colour"), None);
    }

    #[test]
    fn dotted_abbreviations() {
        assert_eq!(normalise_label("D.O.B."), "dob");
        assert_eq!(normalise_label("D.L. No."), "dl no");
        assert_eq!(normalise_label("3 D.O.B."), "dob");

        let reply = "D.O.B.: 02/03/1991\nExp.: 02/03/2031\nD.D.: 99887766";
        let r = parse_reply(reply);
        assert_eq!(r.date_of_birth.as_deref(), Some("02/03/1991"));
        assert_eq!(r.expiration_date.as_deref(), Some("02/03/2031"));
        assert_eq!(r.document_discriminator.as_deref(), Some("99887766"));
        assert_eq!(r.raw_text, None);
    }
}
