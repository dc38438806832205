use serde::{Deserialize, Serialize};

/// One inbound report, as posted by the form. Field names match the
/// form's JSON payload.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub identity_id: String,
    pub name_and_code: String,
    pub rank: String,
    pub department: String,
    pub tablet_screenshot_url: String,
    pub inventory_screenshot_url: String,
    pub reason: String,
    /// The form still sends this for display purposes; the server derives
    /// the real address from the transport layer and ignores it.
    #[serde(default)]
    pub client_address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub identity_id: String,
}
