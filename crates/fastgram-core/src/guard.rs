//! Route guard decisions driven by the login flag cookie.
//!
//! Signed-out navigation to a protected page goes to the login view with a
//! `next` parameter; signed-in navigation to a public page (login, signup)
//! is sent back to `next` or the home page.

use url::form_urlencoded;

use crate::auth::LOGIN_FLAG_COOKIE;

const LOGIN_PATH: &str = "/login";
const HOME_PATH: &str = "/Home";
const PUBLIC_PREFIXES: [&str; 2] = ["/login", "/Signup"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    home_path: String,
    public_prefixes: Vec<String>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            login_path: LOGIN_PATH.to_string(),
            home_path: HOME_PATH.to_string(),
            public_prefixes: PUBLIC_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl RouteGuard {
    pub fn new(
        login_path: impl Into<String>,
        home_path: impl Into<String>,
        public_prefixes: Vec<String>,
    ) -> Self {
        Self {
            login_path: login_path.into(),
            home_path: home_path.into(),
            public_prefixes,
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn decide(&self, logged_in: bool, path: &str, next: Option<&str>) -> GuardDecision {
        let public = self.is_public(path);

        if !logged_in && !public {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("next", path)
                .finish();
            return GuardDecision::Redirect(format!("{}?{}", self.login_path, query));
        }

        if logged_in && public {
            let target = next
                .filter(|n| is_local_path(n))
                .unwrap_or(&self.home_path);
            return GuardDecision::Redirect(target.to_string());
        }

        GuardDecision::Proceed
    }

    /// Decide from a raw `Cookie` header and a `path?query` target.
    pub fn decide_request(&self, cookie_header: Option<&str>, target: &str) -> GuardDecision {
        let logged_in = cookie_header.map(logged_in_from_cookies).unwrap_or(false);
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let next = form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "next")
            .map(|(_, value)| value.into_owned());
        self.decide(logged_in, path, next.as_deref())
    }
}

/// Whether a `Cookie` header carries the login flag
pub fn logged_in_from_cookies(header: &str) -> bool {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(name, value)| name == LOGIN_FLAG_COOKIE && value == "1")
}

// Only same-origin paths; "//host" would leave the site
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}
