use serde::Deserialize;

/// `GET /v1/models` payload of the Anthropic API.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ClaudeModelList {
    #[serde(default)]
    pub(crate) data: Vec<ClaudeModel>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ClaudeModel {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) display_name: Option<String>,
}
