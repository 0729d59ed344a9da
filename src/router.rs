//! Dashboard routes and the passkey guard in front of them.

/// Path of the login view.
pub const LOGIN_PATH: &str = "/login";

/// A view the dashboard can show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    /// The dashboard, optionally focused on one category.
    Dashboard { category_id: Option<String> },
}

impl Route {
    /// Whether the view needs a stored passkey.
    pub fn requires_auth(&self) -> bool {
        matches!(self, Route::Dashboard { .. })
    }
}

/// Result of resolving a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(&'static str),
    NotFound,
}

fn match_path(path: &str) -> Result<Route, Navigation> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [] => Err(Navigation::Redirect(LOGIN_PATH)),
        ["login"] => Ok(Route::Login),
        ["dashboard"] => Ok(Route::Dashboard { category_id: None }),
        ["dashboard", id] => Ok(Route::Dashboard { category_id: Some(id.to_string()) }),
        _ => Err(Navigation::NotFound),
    }
}

/// Resolve `path`, sending visitors without a passkey back to the login view.
///
/// # Example
/// ```
/// use account_hub::router::{resolve, Navigation, Route};
///
/// assert_eq!(resolve("/dashboard/3", false), Navigation::Redirect("/login"));
/// assert_eq!(
///     resolve("/dashboard/3", true),
///     Navigation::Render(Route::Dashboard { category_id: Some("3".to_string()) })
/// );
/// ```
pub fn resolve(path: &str, has_passkey: bool) -> Navigation {
    match match_path(path) {
        Ok(route) if route.requires_auth() && !has_passkey => Navigation::Redirect(LOGIN_PATH),
        Ok(route) => Navigation::Render(route),
        Err(navigation) => navigation,
    }
}
