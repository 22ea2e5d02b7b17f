use serde::{Deserialize, Deserializer, Serialize};

use crate::users::repo_types::{Role, User};

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            role: u.role,
        }
    }
}

/// Body of `POST /user`. `role` defaults to admin when absent or empty.
#[derive(Debug, Deserialize, Default)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Body of `PUT /user/{id}`. Absent or empty fields are left untouched.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Query of `GET /users`. Values that are not integers count as out of range
/// and fall back to the defaults.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page", deserialize_with = "lenient_int")]
    pub page: i64,
    #[serde(default = "default_page_size", deserialize_with = "lenient_int")]
    pub page_size: i64,
}
fn default_page() -> i64 { 1 }
fn default_page_size() -> i64 { 10 }

fn lenient_int<'de, D>(de: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw.and_then(|v| v.trim().parse().ok()).unwrap_or(0))
}

pub const MAX_PAGE_SIZE: i64 = 100;

impl Pagination {
    /// Coerces out-of-range values: page < 1 becomes 1, page_size < 1 becomes
    /// the default, and page_size is capped.
    pub fn normalized(&self) -> (i64, i64) {
        let page = if self.page < 1 { 1 } else { self.page };
        let size = if self.page_size < 1 {
            default_page_size()
        } else {
            self.page_size.min(MAX_PAGE_SIZE)
        };
        (page, size)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserPage {
    pub users: Vec<PublicUser>,
    pub total_users: i64,
    pub current_page: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}
