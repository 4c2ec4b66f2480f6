//! Capability interface over the automated application surface.
//!
//! The workflow speaks only in semantic [`Locator`]s ("the confirm control",
//! "the member result labelled X"). Turning those into selectors is the job of
//! a backend; the WebDriver backend keeps its XPath table in `locators.rs`.
use crate::fault::FaultResult;
use crate::state::SessionToken;
use std::fmt;
use std::time::Duration;

mod locators;
mod process;
mod webdriver;

pub use process::{endpoint_port, DriverProcess};
pub use webdriver::{WebDriverConfig, WebDriverSession};

/// Elements the enrollment workflow interacts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Marker shown only while the browser is not authenticated (login code).
    LoginCode,
    /// Search field above the conversation list.
    ConversationSearch,
    /// Conversation list entry whose title matches exactly.
    ConversationTitle(String),
    /// Header control that opens the group's details panel.
    GroupDetails,
    /// "Add member" entry in the group details panel.
    AddMemberButton,
    /// Search field inside the add-member dialog.
    MemberSearch,
    /// Add-member search result whose visible label matches exactly.
    MemberResult(String),
    /// Control that confirms the current selection.
    ConfirmSelection,
    /// Follow-up "Add members" acknowledgement after confirming.
    AddMembersAck,
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::LoginCode => write!(f, "login code"),
            Locator::ConversationSearch => write!(f, "conversation search"),
            Locator::ConversationTitle(title) => write!(f, "conversation {title:?}"),
            Locator::GroupDetails => write!(f, "group details control"),
            Locator::AddMemberButton => write!(f, "add member control"),
            Locator::MemberSearch => write!(f, "member search"),
            Locator::MemberResult(label) => write!(f, "member result {label:?}"),
            Locator::ConfirmSelection => write!(f, "confirm control"),
            Locator::AddMembersAck => write!(f, "add members acknowledgement"),
        }
    }
}

/// Backend reference to a located element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// Blocking automation capability. One call at a time; implementations are
/// not reentrant.
///
/// Waits return [`crate::fault::Fault::NotFound`] on timeout. Anything that
/// means the session itself is unusable is a [`crate::fault::Fault::Driver`].
pub trait UiDriver {
    fn navigate(&mut self, url: &str) -> FaultResult<()>;

    fn refresh(&mut self) -> FaultResult<()>;

    fn wait_for_visible(&mut self, locator: &Locator, timeout: Duration)
        -> FaultResult<ElementHandle>;

    fn wait_for_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> FaultResult<ElementHandle>;

    /// Wait until no visible element matches `locator`.
    fn wait_for_absent(&mut self, locator: &Locator, timeout: Duration) -> FaultResult<()>;

    fn click(&mut self, element: &ElementHandle) -> FaultResult<()>;

    /// Empty a text field.
    fn clear(&mut self, element: &ElementHandle) -> FaultResult<()>;

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> FaultResult<()>;

    fn get_cookies(&mut self) -> FaultResult<SessionToken>;

    fn set_cookies(&mut self, token: &SessionToken) -> FaultResult<()>;
}
