use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::users::model::{Role, User};

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            bio: u.bio,
            role: u.role,
        }
    }
}

/// Body for `POST /users` and both `PATCH` routes. Everything is optional
/// at the wire level; required fields are enforced by the handler.
#[derive(Debug, Default, Deserialize)]
pub struct UserBody {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub search: Option<String>,
}

/// Page-number pagination envelope.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn build(
        base: &str,
        search: Option<&str>,
        page: i64,
        page_size: i64,
        count: i64,
        results: Vec<T>,
    ) -> Self {
        let link = |n: i64| {
            let mut query = form_urlencoded::Serializer::new(String::new());
            query.append_pair("page", &n.to_string());
            if let Some(s) = search {
                query.append_pair("search", s);
            }
            format!("{base}?{}", query.finish())
        };
        let has_next = page.saturating_mul(page_size) < count;
        Self {
            count,
            next: has_next.then(|| link(page + 1)),
            previous: (page > 1).then(|| link(page - 1)),
            results,
        }
    }
}

/// Number of pages for `count` items; an empty collection still has page 1.
pub fn page_count(count: i64, page_size: i64) -> i64 {
    if count == 0 {
        1
    } else {
        (count + page_size - 1) / page_size
    }
}
