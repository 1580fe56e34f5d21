//! Case conversion for names: record type/field names -> snake_case (tables, columns), table names -> kebab-case (routes).

/// Convert a single identifier from CamelCase to snake_case. Acronyms stay together.
/// e.g. "RentEvent" -> "rent_event", "UserID" -> "user_id", "HTTPServer" -> "http_server"
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p == '_' || p == '-' => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.map(|n| n.is_lowercase()).unwrap_or(false),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c == '-' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier to kebab-case.
/// e.g. "rent_events" -> "rent-events", "RentEvent" -> "rent-event"
pub fn to_kebab_case(s: &str) -> String {
    to_snake_case(s).replace('_', "-")
}
