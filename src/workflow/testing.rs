//! In-memory stand-ins for the browser and the clock.
//!
//! [`Surface`] is the platform side (directory, groups, confirmed members) and
//! outlives browser restarts; [`FakeDriver`] is one browser session on it.
use super::Clock;
use crate::driver::{ElementHandle, Locator, UiDriver};
use crate::fault::{Fault, FaultResult};
use crate::state::{Cookie, SessionToken};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

pub type SharedSurface = Rc<RefCell<Surface>>;

#[derive(Debug)]
pub struct Surface {
    /// Member search: phone typed → visible label of the result.
    pub directory: BTreeMap<String, String>,
    pub groups: Vec<String>,
    /// How long the operator takes to scan the login code once it is
    /// drawn; `None` means they never do.
    pub scan_after: Option<Duration>,
    /// Whether the page ever gets far enough to draw the login code.
    pub login_code_renders: bool,
    /// Whether the confirm control shows up after selecting.
    pub confirm_available: bool,
    /// Selected in the open dialog, not confirmed. Lost on browser restart.
    pub pending: Vec<String>,
    /// Every member-result click, across all sessions.
    pub selections: Vec<String>,
    /// Members actually added to the group.
    pub members: Vec<String>,
    pub confirms: usize,
}

impl Surface {
    pub fn shared(directory: &[(&str, &str)], groups: &[&str]) -> SharedSurface {
        Rc::new(RefCell::new(Surface {
            directory: directory
                .iter()
                .map(|(phone, name)| (phone.to_string(), name.to_string()))
                .collect(),
            groups: groups.iter().map(|group| group.to_string()).collect(),
            scan_after: Some(Duration::from_secs(30)),
            login_code_renders: true,
            confirm_available: true,
            pending: Vec::new(),
            selections: Vec::new(),
            members: Vec::new(),
            confirms: 0,
        }))
    }

    pub fn with_directory(entries: &[(String, String)], groups: &[&str]) -> SharedSurface {
        let surface = Surface::shared(&[], groups);
        surface.borrow_mut().directory = entries.iter().cloned().collect();
        surface
    }

    /// The cookie set the platform hands out after a successful login.
    pub fn issued_token(&self) -> SessionToken {
        SessionToken::new(vec![Cookie {
            name: "wa_session".to_string(),
            value: "authenticated".to_string(),
            domain: Some(".web.example".to_string()),
            path: Some("/".to_string()),
            expiry: None,
            secure: Some(true),
            http_only: Some(true),
            same_site: None,
        }])
    }
}

#[derive(Debug)]
pub struct FakeDriver {
    surface: SharedSurface,
    handles: Vec<Locator>,
    navigated: bool,
    conversation_query: String,
    member_query: String,
    cookie_ok: bool,
    authenticated: bool,
    group_open: bool,
    details_open: bool,
    dialog_open: bool,
    ack_open: bool,
    selections_made: usize,
    crashed: bool,
    /// The Nth member-result click in this session fails with a driver fault.
    pub crash_at_selection: Option<usize>,
    /// Clicking the confirm control fails with a driver fault.
    pub crash_on_confirm: bool,
}

impl FakeDriver {
    /// A fresh, unauthenticated browser session.
    pub fn new(surface: SharedSurface) -> Self {
        surface.borrow_mut().pending.clear();
        Self {
            surface,
            handles: Vec::new(),
            navigated: false,
            conversation_query: String::new(),
            member_query: String::new(),
            cookie_ok: false,
            authenticated: false,
            group_open: false,
            details_open: false,
            dialog_open: false,
            ack_open: false,
            selections_made: 0,
            crashed: false,
            crash_at_selection: None,
            crash_on_confirm: false,
        }
    }

    /// A browser session that is already logged in.
    pub fn signed_in(surface: SharedSurface) -> Self {
        let mut driver = Self::new(surface);
        driver.authenticated = true;
        driver
    }

    fn alive(&self) -> FaultResult<()> {
        if self.crashed {
            return Err(Fault::driver("browser crashed"));
        }
        Ok(())
    }

    fn crash(&mut self, reason: &str) -> Fault {
        self.crashed = true;
        Fault::driver(reason.to_string())
    }

    fn present(&self, locator: &Locator) -> bool {
        let surface = self.surface.borrow();
        match locator {
            Locator::LoginCode => {
                self.navigated && !self.authenticated && surface.login_code_renders
            }
            Locator::ConversationSearch => self.authenticated,
            Locator::ConversationTitle(title) => {
                self.authenticated
                    && surface.groups.contains(title)
                    && &self.conversation_query == title
            }
            Locator::GroupDetails => self.group_open,
            Locator::AddMemberButton => self.details_open,
            Locator::MemberSearch => self.dialog_open,
            Locator::MemberResult(label) => {
                self.dialog_open && surface.directory.get(&self.member_query) == Some(label)
            }
            Locator::ConfirmSelection => {
                self.dialog_open && !surface.pending.is_empty() && surface.confirm_available
            }
            Locator::AddMembersAck => self.ack_open,
        }
    }

    fn resolve(&mut self, locator: &Locator, timeout: Duration) -> FaultResult<ElementHandle> {
        self.alive()?;
        if !self.present(locator) {
            return Err(Fault::not_found(locator.to_string(), timeout));
        }
        self.handles.push(locator.clone());
        Ok(ElementHandle(format!("el-{}", self.handles.len() - 1)))
    }

    fn locator_of(&self, element: &ElementHandle) -> Locator {
        let index: usize = element
            .0
            .trim_start_matches("el-")
            .parse()
            .expect("fake element handle");
        self.handles[index].clone()
    }
}

impl UiDriver for FakeDriver {
    fn navigate(&mut self, _url: &str) -> FaultResult<()> {
        self.alive()?;
        self.navigated = true;
        Ok(())
    }

    fn refresh(&mut self) -> FaultResult<()> {
        self.alive()?;
        if self.cookie_ok {
            self.authenticated = true;
        }
        Ok(())
    }

    fn wait_for_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> FaultResult<ElementHandle> {
        // The operator can only scan a code that is on screen, and only
        // if the wait lasts long enough for them to do it.
        let scan_after = self.surface.borrow().scan_after;
        if *locator == Locator::ConversationSearch
            && self.present(&Locator::LoginCode)
            && scan_after.is_some_and(|needed| timeout >= needed)
        {
            self.authenticated = true;
        }
        self.resolve(locator, timeout)
    }

    fn wait_for_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> FaultResult<ElementHandle> {
        self.resolve(locator, timeout)
    }

    fn wait_for_absent(&mut self, locator: &Locator, timeout: Duration) -> FaultResult<()> {
        self.alive()?;
        if self.present(locator) {
            return Err(Fault::not_found(locator.to_string(), timeout));
        }
        Ok(())
    }

    fn click(&mut self, element: &ElementHandle) -> FaultResult<()> {
        self.alive()?;
        match self.locator_of(element) {
            Locator::ConversationTitle(_) => self.group_open = true,
            Locator::GroupDetails => self.details_open = true,
            Locator::AddMemberButton => {
                self.dialog_open = true;
                self.member_query.clear();
            }
            Locator::MemberResult(_) => {
                self.selections_made += 1;
                if self.crash_at_selection == Some(self.selections_made) {
                    return Err(self.crash("browser crashed while selecting"));
                }
                let mut surface = self.surface.borrow_mut();
                surface.pending.push(self.member_query.clone());
                surface.selections.push(self.member_query.clone());
            }
            Locator::ConfirmSelection => {
                if self.crash_on_confirm {
                    return Err(self.crash("browser crashed while confirming"));
                }
                self.ack_open = true;
            }
            Locator::AddMembersAck => {
                let mut surface = self.surface.borrow_mut();
                let added: Vec<String> = surface.pending.drain(..).collect();
                surface.members.extend(added);
                surface.confirms += 1;
                self.ack_open = false;
                self.dialog_open = false;
            }
            _ => {}
        }
        Ok(())
    }

    fn clear(&mut self, element: &ElementHandle) -> FaultResult<()> {
        self.alive()?;
        match self.locator_of(element) {
            Locator::ConversationSearch => self.conversation_query.clear(),
            Locator::MemberSearch => self.member_query.clear(),
            _ => {}
        }
        Ok(())
    }

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> FaultResult<()> {
        self.alive()?;
        match self.locator_of(element) {
            Locator::ConversationSearch => self.conversation_query.push_str(text),
            Locator::MemberSearch => self.member_query.push_str(text),
            _ => {}
        }
        Ok(())
    }

    fn get_cookies(&mut self) -> FaultResult<SessionToken> {
        self.alive()?;
        if !self.authenticated {
            return Ok(SessionToken::default());
        }
        Ok(self.surface.borrow().issued_token())
    }

    fn set_cookies(&mut self, token: &SessionToken) -> FaultResult<()> {
        self.alive()?;
        self.cookie_ok = *token == self.surface.borrow().issued_token();
        Ok(())
    }
}

/// Clock that records pauses instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingClock {
    pauses: RefCell<Vec<(&'static str, Duration)>>,
}

impl RecordingClock {
    pub fn pauses_for(&self, reason: &str) -> Vec<Duration> {
        self.pauses
            .borrow()
            .iter()
            .filter(|(recorded, _)| *recorded == reason)
            .map(|(_, duration)| *duration)
            .collect()
    }
}

impl Clock for RecordingClock {
    fn pause(&self, duration: Duration, reason: &'static str) {
        self.pauses.borrow_mut().push((reason, duration));
    }
}
