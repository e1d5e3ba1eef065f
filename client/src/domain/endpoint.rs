//! Backend REST surface consumed by the client.

use super::ports::Method;
use super::{Role, ScholarshipId};

/// One backend route with its method and query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
}

impl Endpoint {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// `POST /auth/signup` or `POST /admin/signup`.
    pub fn sign_up(role: Role) -> Self {
        Self::new(Method::Post, format!("{}/signup", auth_root(role)))
    }

    /// `POST /auth/signin` or `POST /admin/signin`.
    pub fn sign_in(role: Role) -> Self {
        Self::new(Method::Post, format!("{}/signin", auth_root(role)))
    }

    /// `GET /scholarships` with filter query pairs.
    pub fn scholarships(query: Vec<(String, String)>) -> Self {
        Self {
            query,
            ..Self::new(Method::Get, "/scholarships")
        }
    }

    /// `GET /scholarships/:id`
    pub fn scholarship(id: &ScholarshipId) -> Self {
        Self::new(Method::Get, format!("/scholarships/{id}"))
    }

    /// `POST /admin/scholarships`
    pub fn create_scholarship() -> Self {
        Self::new(Method::Post, "/admin/scholarships")
    }

    /// `GET /user/saved-scholarships`
    pub fn saved_scholarships() -> Self {
        Self::new(Method::Get, "/user/saved-scholarships")
    }

    /// `POST /user/saved-scholarships/:id`
    pub fn save_scholarship(id: &ScholarshipId) -> Self {
        Self::new(Method::Post, format!("/user/saved-scholarships/{id}"))
    }

    /// `DELETE /user/saved-scholarships/:id`
    pub fn unsave_scholarship(id: &ScholarshipId) -> Self {
        Self::new(Method::Delete, format!("/user/saved-scholarships/{id}"))
    }

    /// `GET /user/applications`
    pub fn applications() -> Self {
        Self::new(Method::Get, "/user/applications")
    }

    /// `POST /user/applications/:id`
    pub fn apply(id: &ScholarshipId) -> Self {
        Self::new(Method::Post, format!("/user/applications/{id}"))
    }

    /// `PUT /user/profile`
    pub fn profile() -> Self {
        Self::new(Method::Put, "/user/profile")
    }

    /// HTTP method.
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Path relative to the API base.
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Query pairs.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }
}

const fn auth_root(role: Role) -> &'static str {
    match role {
        Role::User => "/auth",
        Role::Admin => "/admin",
    }
}
