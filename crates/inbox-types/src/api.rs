use serde::Deserialize;

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignInQuery {
    #[serde(default)]
    pub error: Option<u8>,
}

// -- Inbox --

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    /// Contact name filter from the search box.
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ComposeForm {
    #[serde(default)]
    pub text: String,
}

// -- Contact panel --

#[derive(Debug, Deserialize)]
pub struct TagForm {
    #[serde(default)]
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct NotesForm {
    #[serde(default)]
    pub notes: String,
}
