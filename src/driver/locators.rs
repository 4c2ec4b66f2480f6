//! XPath table for the WhatsApp Web DOM.
//!
//! This is the only file that knows the platform's markup.
use super::Locator;

pub fn xpath_for(locator: &Locator) -> String {
    match locator {
        Locator::LoginCode => r#"//canvas[@aria-label="Scan me!"]"#.to_string(),
        Locator::ConversationSearch => r#"//div[@contenteditable="true"][@data-tab="3"]"#.to_string(),
        Locator::ConversationTitle(title) => format!("//span[@title={}]", xpath_literal(title)),
        Locator::GroupDetails => r#"//header//div[@title="Profile details"]"#.to_string(),
        Locator::AddMemberButton => {
            r#"//div[@role="button"]//div[text()="Add member"]"#.to_string()
        }
        Locator::MemberSearch => {
            r#"//div[@role="textbox" and @aria-label="Search input textbox" and @data-tab="3"]"#
                .to_string()
        }
        Locator::MemberResult(label) => format!(
            r#"//div[@role="button"]//span[@title={}]"#,
            xpath_literal(label)
        ),
        Locator::ConfirmSelection => r#"//span[@aria-label="Confirm"]"#.to_string(),
        Locator::AddMembersAck => concat!(
            r#"//div[contains(@data-animate-modal-popup, "true")]"#,
            r#"//button//div[text()="Add members"]"#
        )
        .to_string(),
    }
}

/// Quote an arbitrary string as an XPath 1.0 literal.
///
/// XPath has no escape syntax, so strings holding both quote kinds are
/// assembled with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{part}\""))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}
