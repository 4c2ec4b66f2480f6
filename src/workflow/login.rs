//! Restore a saved session or walk the operator through a fresh login.
use super::{Clock, Timing};
use crate::driver::{Locator, UiDriver};
use crate::fault::{Fault, FaultResult};
use crate::state::SessionStore;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Saved cookies were accepted.
    Restored,
    /// The operator completed an interactive login; cookies were saved.
    LoggedIn,
}

/// Bring `driver` to an authenticated main surface.
///
/// A saved token the platform rejects looks exactly like having no token, so
/// both paths end in the interactive login.
pub fn establish_session<D: UiDriver + ?Sized, C: Clock + ?Sized>(
    driver: &mut D,
    store: &SessionStore,
    clock: &C,
    entry_url: &str,
    timing: &Timing,
) -> FaultResult<SessionOrigin> {
    match store.load()? {
        Some(token) => {
            driver.navigate(entry_url)?;
            driver.set_cookies(&token)?;
            driver.refresh()?;
            match driver.wait_for_visible(&Locator::ConversationSearch, timing.session_check) {
                Ok(_) => {
                    tracing::info!(cookies = token.cookies.len(), "saved session restored");
                    return Ok(SessionOrigin::Restored);
                }
                Err(Fault::NotFound { .. }) => {
                    tracing::warn!("saved session was not accepted; interactive login required");
                }
                Err(other) => return Err(other),
            }
        }
        None => tracing::info!(path = %store.path().display(), "no saved session"),
    }
    interactive_login(driver, store, clock, entry_url, timing)
}

fn interactive_login<D: UiDriver + ?Sized, C: Clock + ?Sized>(
    driver: &mut D,
    store: &SessionStore,
    clock: &C,
    entry_url: &str,
    timing: &Timing,
) -> FaultResult<SessionOrigin> {
    driver.navigate(entry_url)?;
    tracing::info!(
        timeout_secs = timing.login.as_secs(),
        "scan the login code with your phone to continue"
    );
    // Only the main surface proves the login; the code may not be drawn yet.
    match driver.wait_for_visible(&Locator::ConversationSearch, timing.login) {
        Ok(_) => {}
        Err(Fault::NotFound { .. }) => {
            let code_shown = match driver.wait_for_visible(&Locator::LoginCode, Duration::ZERO) {
                Ok(_) => true,
                Err(Fault::NotFound { .. }) => false,
                Err(other) => return Err(other),
            };
            let detail = if code_shown {
                "login code still displayed"
            } else {
                "login code never displayed"
            };
            return Err(Fault::Session(format!(
                "login not completed within {}s ({detail})",
                timing.login.as_secs()
            )));
        }
        Err(other) => return Err(other),
    }
    clock.pause(timing.login_settle, "login settle");

    let token = driver.get_cookies()?;
    if token.is_empty() {
        return Err(Fault::Session(
            "browser reported no cookies after login".to_string(),
        ));
    }
    store.save(&token)?;
    tracing::info!(cookies = token.cookies.len(), path = %store.path().display(), "session saved");
    Ok(SessionOrigin::LoggedIn)
}
