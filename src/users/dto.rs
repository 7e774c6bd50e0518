use serde::{Deserialize, Serialize};

use crate::users::repo_types::User;
use crate::validation::Fields;

/// Scalar fields of a create/update body, from JSON or multipart text parts.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UserFields {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl Fields for UserFields {
    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "email" => self.email.as_deref(),
            "password" => self.password.as_deref(),
            "name" => self.name.as_deref(),
            _ => None,
        }
    }
}

/// User as returned to clients. The password hash is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub photo: Option<String>,
}

impl UserResponse {
    pub fn from_user(user: User, base_url: &str) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            photo: user.photo.map(|p| photo_url(base_url, &p)),
        }
    }
}

pub fn photo_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Pagination envelope for `GET /users`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub count: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub next_page: Option<String>,
    pub prev_page: Option<String>,
    pub users: Vec<UserResponse>,
}

/// Raw query parameters; coercion happens in `pagination`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}
