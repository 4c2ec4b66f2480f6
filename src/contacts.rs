//! Contact loading from vCard exports.
//!
//! The loader produces an ordered, immutable phone → display-name mapping.
//! Order follows the first appearance of each phone key in the file and
//! defines the enrollment attempt order.
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// A single contact to enroll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Unique key, typed verbatim into the platform's member search.
    pub phone: String,
    /// Visible label matched against search results.
    pub name: String,
}

/// Ordered set of contacts keyed by exact phone string.
#[derive(Debug, Clone, Default)]
pub struct ContactSet {
    contacts: Vec<Contact>,
    index: BTreeMap<String, usize>,
}

impl ContactSet {
    /// Insert a contact; a repeated phone key replaces the name in place.
    fn upsert(&mut self, phone: String, name: String) {
        if let Some(&slot) = self.index.get(&phone) {
            self.contacts[slot].name = name;
            return;
        }
        self.index.insert(phone.clone(), self.contacts.len());
        self.contacts.push(Contact { phone, name });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn get(&self, phone: &str) -> Option<&Contact> {
        self.index.get(phone).map(|&slot| &self.contacts[slot])
    }
}

impl FromIterator<(String, String)> for ContactSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut set = ContactSet::default();
        for (phone, name) in iter {
            set.upsert(phone, name);
        }
        set
    }
}

/// Load contacts from a `.vcf` file.
pub fn load_vcard(path: &Path) -> Result<ContactSet> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read contacts {}", path.display()))?;
    parse_vcard(&text).with_context(|| format!("parse contacts {}", path.display()))
}

#[derive(Default)]
struct CardFields {
    tel: Option<String>,
    full_name: Option<String>,
    structured_name: Option<String>,
}

/// Parse vCard text into a [`ContactSet`].
pub fn parse_vcard(text: &str) -> Result<ContactSet> {
    let mut set = ContactSet::default();
    let mut current: Option<(usize, CardFields)> = None;

    for (line_no, line) in unfold_lines(text) {
        let Some((head, value)) = line.split_once(':') else {
            continue;
        };
        let mut params = head.split(';');
        let property = params.next().unwrap_or_default();
        // Grouped properties look like `item1.TEL`.
        let property = property
            .rsplit_once('.')
            .map_or(property, |(_, name)| name)
            .to_ascii_uppercase();
        let value = value.trim();

        match property.as_str() {
            "BEGIN" if value.eq_ignore_ascii_case("VCARD") => {
                if let Some((start, _)) = current {
                    return Err(anyhow!(
                        "line {line_no}: BEGIN:VCARD inside card opened at line {start}"
                    ));
                }
                current = Some((line_no, CardFields::default()));
            }
            "END" if value.eq_ignore_ascii_case("VCARD") => {
                let (start, fields) = current
                    .take()
                    .ok_or_else(|| anyhow!("line {line_no}: END:VCARD without BEGIN:VCARD"))?;
                finish_card(&mut set, start, fields);
            }
            "TEL" => {
                if let Some((_, fields)) = current.as_mut() {
                    if fields.tel.is_none() && !value.is_empty() {
                        fields.tel = Some(unescape(value));
                    }
                }
            }
            "FN" => {
                if let Some((_, fields)) = current.as_mut() {
                    fields.full_name = Some(unescape(value));
                }
            }
            "N" => {
                if let Some((_, fields)) = current.as_mut() {
                    fields.structured_name = Some(structured_name(value));
                }
            }
            _ => {}
        }
    }

    if let Some((start, _)) = current {
        return Err(anyhow!("card opened at line {start} is never closed"));
    }
    Ok(set)
}

fn finish_card(set: &mut ContactSet, start: usize, fields: CardFields) {
    let Some(phone) = fields.tel else {
        tracing::debug!(line = start, "skipping card without TEL");
        return;
    };
    let name = [fields.full_name, fields.structured_name]
        .into_iter()
        .flatten()
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| phone.clone());
    set.upsert(phone, name);
}

/// Join RFC 6350 folded lines; returns each logical line with its starting line number.
fn unfold_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix([' ', '\t']) {
            if let Some((_, last)) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        if raw.trim().is_empty() {
            continue;
        }
        lines.push((idx + 1, raw.to_string()));
    }
    lines
}

/// `N` is `family;given;additional;prefix;suffix`; render it as a display label.
fn structured_name(value: &str) -> String {
    let parts: Vec<String> = value
        .split(';')
        .map(unescape)
        .map(|part| part.trim().to_string())
        .collect();
    let order = [3usize, 1, 2, 0, 4];
    order
        .iter()
        .filter_map(|&idx| parts.get(idx))
        .filter(|part| !part.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ")
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cards_in_file_order() {
        let text = "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Ada Lovelace\r\nTEL;TYPE=CELL:+44 20 7946 0001\r\nEND:VCARD\r\n\
BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Grace Hopper\r\nTEL:+1 555 0100\r\nEND:VCARD\r\n";
        let set = parse_vcard(text).expect("parse");
        let phones: Vec<&str> = set.iter().map(|c| c.phone.as_str()).collect();
        assert_eq!(phones, vec!["+44 20 7946 0001", "+1 555 0100"]);
        assert_eq!(set.get("+1 555 0100").map(|c| c.name.as_str()), Some("Grace Hopper"));
    }

    #[test]
    fn falls_back_to_structured_name_then_phone() {
        let text = "BEGIN:VCARD\nN:Hopper;Grace;Brewster;Rear Adm.;\nTEL:111\nEND:VCARD\n\
BEGIN:VCARD\nTEL:222\nEND:VCARD\n";
        let set = parse_vcard(text).expect("parse");
        assert_eq!(
            set.get("111").map(|c| c.name.as_str()),
            Some("Rear Adm. Grace Brewster Hopper")
        );
        assert_eq!(set.get("222").map(|c| c.name.as_str()), Some("222"));
    }

    #[test]
    fn unfolds_continuation_lines_and_groups() {
        let text = "BEGIN:VCARD\nFN:Katherine\n  Johnson\nitem1.TEL:+1 555\n 0199\nEND:VCARD\n";
        let set = parse_vcard(text).expect("parse");
        let contact = set.iter().next().expect("one contact");
        assert_eq!(contact.phone, "+1 5550199");
        assert_eq!(contact.name, "Katherine Johnson");
    }

    #[test]
    fn duplicate_phone_keeps_position_and_takes_later_name() {
        let text = "BEGIN:VCARD\nFN:First\nTEL:1\nEND:VCARD\n\
BEGIN:VCARD\nFN:Second\nTEL:2\nEND:VCARD\n\
BEGIN:VCARD\nFN:First Renamed\nTEL:1\nEND:VCARD\n";
        let set = parse_vcard(text).expect("parse");
        assert_eq!(set.len(), 2);
        let names: Vec<&str> = set.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["First Renamed", "Second"]);
    }

    #[test]
    fn skips_cards_without_phone() {
        let text = "BEGIN:VCARD\nFN:No Phone\nEND:VCARD\nBEGIN:VCARD\nFN:Phone\nTEL:9\nEND:VCARD\n";
        let set = parse_vcard(text).expect("parse");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn rejects_malformed_structure() {
        let err = parse_vcard("END:VCARD\n").expect_err("stray END");
        assert!(err.to_string().contains("line 1"), "{err}");

        let err = parse_vcard("BEGIN:VCARD\nBEGIN:VCARD\n").expect_err("nested BEGIN");
        assert!(err.to_string().contains("line 2"), "{err}");

        let err = parse_vcard("BEGIN:VCARD\nTEL:1\n").expect_err("unterminated");
        assert!(err.to_string().contains("never closed"), "{err}");
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = load_vcard(&dir.path().join("missing.vcf")).expect_err("missing file");
        assert!(format!("{err:#}").contains("read contacts"));
    }
}
