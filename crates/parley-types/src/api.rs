use serde::Deserialize;

use crate::models::UserId;

// -- Auth --

#[derive(Debug, Default, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// `?error=` carried back to a form page after a failed POST.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorQuery {
    pub error: Option<String>,
}

// -- Groups --

#[derive(Debug, Default, Deserialize)]
pub struct AddGroupForm {
    #[serde(default, rename = "groupName")]
    pub group_name: String,
    #[serde(default)]
    pub users: Vec<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InviteForm {
    #[serde(default)]
    pub users: Vec<UserId>,
}

// -- Messages --

#[derive(Debug, Default, Deserialize)]
pub struct SendMessageForm {
    /// Empty text is allowed; a missing field is not.
    pub text: Option<String>,
}

// -- Reactions --

#[derive(Debug, Default, Deserialize)]
pub struct ReactForm {
    #[serde(default)]
    pub emoji_name: String,
}
