use crate::models::SubmissionRequest;
use once_cell::sync::Lazy;
use regex::Regex;

/// The closed set of department codes the form accepts.
pub const DEPARTMENTS: [&str; 9] = [
    "LSPD", "LSSD", "SAHP", "FIB", "DEA", "EMS", "SANG", "GOV", "WN",
];

// Latin or Cyrillic name words separated by single spaces, then " | "
// and the personnel code digits, e.g. "Ivan Petrov | 42".
static NAME_AND_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-zА-Яа-яЁё]+(?: [A-Za-zА-Яа-яЁё]+)* \| \d+$")
        .expect("static pattern is valid")
});

/// First failing field rule, with the message shown to the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

pub fn is_valid_identity_id(s: &str) -> bool {
    (17..=20).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_wellformed_url(s: &str) -> bool {
    reqwest::Url::parse(s).is_ok()
}

/// Checks every field rule in form order and reports the first failure.
/// A report either passes all rules or is rejected whole.
pub fn validate(report: &SubmissionRequest) -> Result<(), FieldError> {
    if !is_valid_identity_id(&report.identity_id) {
        return Err(FieldError {
            field: "identityId",
            message: "Identity ID must be 17-20 digits",
        });
    }
    if !NAME_AND_CODE_RE.is_match(&report.name_and_code) {
        return Err(FieldError {
            field: "nameAndCode",
            message: "Name and code must look like 'Ivan Petrov | 42'",
        });
    }
    if !is_numeric(&report.rank) {
        return Err(FieldError {
            field: "rank",
            message: "Rank must be a number",
        });
    }
    if !DEPARTMENTS.contains(&report.department.as_str()) {
        return Err(FieldError {
            field: "department",
            message: "Unknown department code",
        });
    }
    if !is_wellformed_url(&report.tablet_screenshot_url) {
        return Err(FieldError {
            field: "tabletScreenshotUrl",
            message: "Tablet screenshot must be a valid link",
        });
    }
    if !is_wellformed_url(&report.inventory_screenshot_url) {
        return Err(FieldError {
            field: "inventoryScreenshotUrl",
            message: "Inventory screenshot must be a valid link",
        });
    }
    if report.reason.is_empty() {
        return Err(FieldError {
            field: "reason",
            message: "Reason must not be empty",
        });
    }
    Ok(())
}
