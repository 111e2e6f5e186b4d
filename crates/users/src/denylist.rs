//! Source-IP denylist.

use serde::Serialize;

use crate::user::User;

/// Addresses rejected when no denylist is configured.
pub const DEFAULT_DENYLIST: [&str; 4] = [
    "32.241.244.236",
    "15.55.49.164",
    "81.1.95.253",
    "126.130.43.183",
];

/// A user event came from a denylisted address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid IP Address received !")]
pub struct RestrictedIp {
    pub ip: String,
}

/// Ordered set of rejected source addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpDenylist(Vec<String>);

impl IpDenylist {
    /// Build from entries; blanks are dropped, duplicates keep their first position.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if !entry.is_empty() && !list.iter().any(|e| e == entry) {
                list.push(entry.to_string());
            }
        }
        Self(list)
    }

    /// Parse a comma-separated list.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, ip: &str) -> bool {
        let ip = ip.trim();
        self.0.iter().any(|e| e == ip)
    }

    pub fn validate(&self, user: &User) -> Result<(), RestrictedIp> {
        if self.contains(&user.ip_address) {
            return Err(RestrictedIp {
                ip: user.ip_address.clone(),
            });
        }
        Ok(())
    }
}

impl Default for IpDenylist {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(ip: &str) -> User {
        User {
            id: 1,
            first_name: "A".into(),
            last_name: "B".into(),
            email: "a@b.c".into(),
            gender: "Male".into(),
            ip_address: ip.into(),
        }
    }

    #[test]
    fn default_list_rejects_known_addresses() {
        let list = IpDenylist::default();
        let err = list.validate(&user("15.55.49.164")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid IP Address received !");
        assert_eq!(err.ip, "15.55.49.164");
        assert!(list.validate(&user("10.0.0.1")).is_ok());
    }

    #[test]
    fn parse_keeps_order_and_drops_duplicates() {
        let list = IpDenylist::parse(" 1.1.1.1, 2.2.2.2,,1.1.1.1 ");
        assert_eq!(list.entries(), ["1.1.1.1", "2.2.2.2"]);
        assert!(list.contains("2.2.2.2"));
    }
}
