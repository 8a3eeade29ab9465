use lablingo::{MediaType, View};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub attached_file: Option<MediaType>,
    pub view: View,
}
