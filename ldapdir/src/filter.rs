use crate::error::LdapError;
use crate::search::LdapEntry;

/// Subset of RFC 4515 search filters: and, or, not, presence, equality and
/// substring assertions. Attribute names and text values match case-insensitively,
/// binary values (written with \XX escapes) match exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LdapFilter {
    And(Vec<LdapFilter>),
    Or(Vec<LdapFilter>),
    Not(Box<LdapFilter>),
    Present(String),
    Equality(String, Vec<u8>),
    Substring {
        attr: String,
        initial: Option<Vec<u8>>,
        any: Vec<Vec<u8>>,
        last: Option<Vec<u8>>,
    },
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    filter: &'a str,
}

impl LdapFilter {
    pub fn parse(filter: &str) -> Result<Self, LdapError> {
        let trimmed = filter.trim();
        // Tolerate a missing outer pair of parenthesis, like most LDAP tools do
        let wrapped;
        let text = if trimmed.starts_with('(') {
            trimmed
        } else {
            wrapped = format!("({})", trimmed);
            wrapped.as_str()
        };
        let mut parser = Parser { input: text.as_bytes(), pos: 0, filter };
        let res = parser.parse_filter()?;
        if parser.pos != parser.input.len() {
            return Err(parser.error("trailing characters"));
        }
        Ok(res)
    }

    pub fn matches(&self, entry: &LdapEntry) -> bool {
        match self {
            Self::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Self::Not(filter) => !filter.matches(entry),
            Self::Present(attr) => entry.get(attr).map(|vals| !vals.is_empty()).unwrap_or(false),
            Self::Equality(attr, value) => entry.get(attr)
                .map(|vals| vals.iter().any(|v| values_equal(v, value)))
                .unwrap_or(false),
            Self::Substring { attr, initial, any, last } => entry.get(attr)
                .map(|vals| vals.iter().any(|v| substring_matches(&fold(v), initial.as_deref(), any, last.as_deref())))
                .unwrap_or(false),
        }
    }
}

fn fold(value: &[u8]) -> String {
    String::from_utf8_lossy(value).to_lowercase()
}

fn values_equal(stored: &[u8], asserted: &[u8]) -> bool {
    if stored == asserted {
        return true;
    }
    match (std::str::from_utf8(stored), std::str::from_utf8(asserted)) {
        (Ok(a), Ok(b)) => a.to_lowercase() == b.to_lowercase(),
        _ => false,
    }
}

fn substring_matches(haystack: &str, initial: Option<&[u8]>, any: &[Vec<u8>], last: Option<&[u8]>) -> bool {
    let mut rest = haystack;
    if let Some(initial) = initial {
        let initial = fold(initial);
        if !rest.starts_with(&initial) {
            return false;
        }
        rest = &rest[initial.len()..];
    }
    for part in any {
        let part = fold(part);
        match rest.find(&part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    match last {
        Some(last) => rest.ends_with(&fold(last)),
        None => true,
    }
}

/// Escapes the characters which have a meaning in an assertion value.
pub fn escape_filter_value(value: &str) -> String {
    let mut res = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' | '(' | ')' | '\\' | '\0' => res.push_str(&format!("\\{:02x}", c as u32)),
            _ => res.push(c),
        }
    }
    res
}

// Binary values (SIDs, GUIDs) are written entirely as \XX escapes
pub fn escape_filter_bytes(value: &[u8]) -> String {
    value.iter().map(|b| format!("\\{:02x}", b)).collect()
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &str) -> LdapError {
        LdapError::InvalidFilter {
            filter: self.filter.to_owned(),
            reason: format!("{} at offset {}", reason, self.pos),
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), LdapError> {
        if self.input.get(self.pos) == Some(&c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c as char)))
        }
    }

    fn parse_filter(&mut self) -> Result<LdapFilter, LdapError> {
        self.expect(b'(')?;
        let res = match self.input.get(self.pos) {
            Some(b'&') => {
                self.pos += 1;
                LdapFilter::And(self.parse_list()?)
            },
            Some(b'|') => {
                self.pos += 1;
                LdapFilter::Or(self.parse_list()?)
            },
            Some(b'!') => {
                self.pos += 1;
                LdapFilter::Not(Box::new(self.parse_filter()?))
            },
            Some(_) => self.parse_item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.expect(b')')?;
        Ok(res)
    }

    fn parse_list(&mut self) -> Result<Vec<LdapFilter>, LdapError> {
        let mut res = Vec::new();
        while self.input.get(self.pos) == Some(&b'(') {
            res.push(self.parse_filter()?);
        }
        if res.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(res)
    }

    fn parse_item(&mut self) -> Result<LdapFilter, LdapError> {
        let start = self.pos;
        while let Some(c) = self.input.get(self.pos) {
            if c.is_ascii_alphanumeric() || *c == b'-' || *c == b';' || *c == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error("expected an attribute name"));
        }
        let attr = String::from_utf8_lossy(&self.input[start..self.pos]).to_lowercase();
        match self.input.get(self.pos) {
            Some(b'=') => self.pos += 1,
            Some(b'>') | Some(b'<') | Some(b'~') => return Err(self.error("only equality, presence and substring assertions are supported")),
            _ => return Err(self.error("expected '='")),
        }

        // The value runs up to the closing parenthesis, split on unescaped '*'
        let mut parts: Vec<Vec<u8>> = vec![Vec::new()];
        loop {
            match self.input.get(self.pos) {
                None => return Err(self.error("unterminated assertion value")),
                Some(b')') => break,
                Some(b'(') => return Err(self.error("unescaped '(' in assertion value")),
                Some(b'*') => {
                    parts.push(Vec::new());
                    self.pos += 1;
                },
                Some(b'\\') => {
                    let byte = self.input.get(self.pos + 1..self.pos + 3)
                        .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                        .and_then(|h| std::str::from_utf8(h).ok())
                        .and_then(|h| u8::from_str_radix(h, 16).ok());
                    match (byte, parts.last_mut()) {
                        (Some(b), Some(part)) => part.push(b),
                        _ => return Err(self.error("invalid escape sequence")),
                    }
                    self.pos += 3;
                },
                Some(c) => {
                    let c = *c;
                    if let Some(part) = parts.last_mut() {
                        part.push(c);
                    }
                    self.pos += 1;
                },
            }
        }

        if parts.len() == 1 {
            return Ok(LdapFilter::Equality(attr, parts.remove(0)));
        }
        if parts.len() == 2 && parts.iter().all(|p| p.is_empty()) {
            return Ok(LdapFilter::Present(attr));
        }
        let last = parts.pop().filter(|p| !p.is_empty());
        let initial = Some(parts.remove(0)).filter(|p| !p.is_empty());
        let any = parts.into_iter().filter(|p| !p.is_empty()).collect();
        Ok(LdapFilter::Substring { attr, initial, any, last })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpo_container() -> LdapEntry {
        LdapEntry::new("OU=Workstations,DC=example,DC=com")
            .with_str("objectClass", "top")
            .with_str("objectClass", "organizationalUnit")
            .with_str("gPLink", "[LDAP://cn={31B2F340-016D-11D2-945F-00C04FB984F9},cn=policies,cn=system,DC=example,DC=com;0]")
            .with_bytes("objectSid", &[0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00])
    }

    #[test]
    fn presence_and_equality() {
        let entry = gpo_container();
        assert!(LdapFilter::parse("(gPLink=*)").unwrap().matches(&entry));
        assert!(LdapFilter::parse("(objectclass=ORGANIZATIONALUNIT)").unwrap().matches(&entry));
        assert!(!LdapFilter::parse("(objectClass=user)").unwrap().matches(&entry));
        assert!(!LdapFilter::parse("(description=*)").unwrap().matches(&entry));
        // no outer parenthesis
        assert!(LdapFilter::parse("objectClass=top").unwrap().matches(&entry));
    }

    #[test]
    fn boolean_operators() {
        let entry = gpo_container();
        assert!(LdapFilter::parse("(&(objectClass=organizationalUnit)(gPLink=*))").unwrap().matches(&entry));
        assert!(LdapFilter::parse("(|(objectClass=user)(objectClass=top))").unwrap().matches(&entry));
        assert!(LdapFilter::parse("(!(objectClass=user))").unwrap().matches(&entry));
        assert!(!LdapFilter::parse("(&(objectClass=user)(gPLink=*))").unwrap().matches(&entry));
    }

    #[test]
    fn substrings() {
        let entry = gpo_container();
        assert!(LdapFilter::parse("(gPLink=*{31b2f340-016d-11d2-945f-00c04fb984f9}*)").unwrap().matches(&entry));
        assert!(LdapFilter::parse("(gPLink=[LDAP://*;0])").unwrap().matches(&entry));
        assert!(!LdapFilter::parse("(gPLink=*;2])").unwrap().matches(&entry));
        assert!(LdapFilter::parse("(objectClass=organiz*unit)").unwrap().matches(&entry));
    }

    #[test]
    fn escaped_binary_values() {
        let entry = gpo_container();
        let filter = LdapFilter::parse("(objectSid=\\01\\01\\00\\00\\00\\00\\00\\01\\00\\00\\00\\00)").unwrap();
        assert!(filter.matches(&entry));
        assert!(!LdapFilter::parse("(objectSid=\\01\\02)").unwrap().matches(&entry));
        // escaped parenthesis and asterisk are literal
        assert_eq!(LdapFilter::parse("(cn=a\\2ab\\28)").unwrap(), LdapFilter::Equality("cn".to_owned(), b"a*b(".to_vec()));
    }

    #[test]
    fn escape_values() {
        assert_eq!(escape_filter_value("a*(b)\\"), "a\\2a\\28b\\29\\5c");
        assert_eq!(escape_filter_bytes(&[1, 0xab]), "\\01\\ab");
        let filter = format!("(cn={})", escape_filter_value("x*(y)"));
        assert_eq!(LdapFilter::parse(&filter).unwrap(), LdapFilter::Equality("cn".to_owned(), b"x*(y)".to_vec()));
    }

    #[test]
    fn malformed_filters() {
        for filter in ["", "(", "(cn=x", "(&)", "(cn>=3)", "(=x)", "(cn=x))", "(cn=\\zz)", "(cn=a(b)"] {
            assert!(matches!(LdapFilter::parse(filter), Err(LdapError::InvalidFilter { .. })), "{} should not parse", filter);
        }
    }
}
