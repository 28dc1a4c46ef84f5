//! vCard 3.0 (RFC 2426)

use cm_models::Contact;

pub const VCARD_CONTENT_TYPE: &str = "text/vcard; charset=utf-8";

const CRLF: &str = "\r\n";

/// Escape a text value: backslash, comma, semicolon and line breaks
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Render a single contact as a vCard 3.0 document
pub fn contact_to_vcard(contact: &Contact) -> String {
    let mut lines = vec!["BEGIN:VCARD".to_string(), "VERSION:3.0".to_string()];

    lines.push(format!(
        "N:{};{};{};;",
        escape(contact.last_name.trim()),
        escape(contact.first_name.trim()),
        escape(non_empty(&contact.middle_name).unwrap_or_default()),
    ));
    lines.push(format!("FN:{}", escape(&contact.full_name())));

    if let Some(company) = non_empty(&contact.company) {
        lines.push(format!("ORG:{}", escape(company)));
    }
    if let Some(phone) = non_empty(&contact.phone) {
        lines.push(format!("TEL;TYPE=CELL:{}", escape(phone)));
    }
    if let Some(birthday) = contact.birthday {
        lines.push(format!("BDAY:{}", birthday.format("%Y-%m-%d")));
    }
    if let Some(owner) = non_empty(&contact.owner_name) {
        lines.push(format!("NOTE:{}", escape(&format!("Contact owner: {}", owner))));
    }

    lines.push("END:VCARD".to_string());

    let mut card = lines.join(CRLF);
    card.push_str(CRLF);
    card
}

/// Download file name: the contact's name in lowercase with underscores
pub fn vcard_filename(contact: &Contact) -> String {
    let stem = contact
        .full_name()
        .split_whitespace()
        .map(|part| {
            part.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-')
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if stem.is_empty() {
        format!("contact-{}.vcf", contact.id)
    } else {
        format!("{}.vcf", stem)
    }
}
