use serde::{Deserialize, Serialize};

/// A platform user, keyed by the user part of their address.
///
/// WhatsApp addresses look like `15551234567:12@s.whatsapp.net`: the user
/// part is `15551234567`, `12` is the device and `s.whatsapp.net` the server.
/// Only the user part is stable across a person's linked devices, so it is
/// the part used for comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    user: String,
    server: Option<String>,
}

impl Identity {
    /// Parse a full address (`user[:device]@server`) or a bare user id.
    pub fn parse(address: &str) -> Self {
        let address = address.trim();
        let (local, server) = match address.split_once('@') {
            Some((local, server)) if !server.is_empty() => (local, Some(server.to_string())),
            Some((local, _)) => (local, None),
            None => (address, None),
        };
        let user = local.split_once(':').map_or(local, |(user, _)| user);
        Self {
            user: normalize_user(user),
            server,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// Whether this identity is the configured sender.
    ///
    /// `configured` may be written as a bare number, with a leading `+`, or
    /// as a full address. An empty value matches nobody.
    pub fn matches(&self, configured: &str) -> bool {
        let other = Self::parse(configured);
        !other.user.is_empty() && other.user == self.user
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.server {
            Some(server) => write!(f, "{}@{server}", self.user),
            None => f.write_str(&self.user),
        }
    }
}

fn normalize_user(user: &str) -> String {
    user.trim().trim_start_matches('+').to_string()
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn parses_device_address() {
        let id = Identity::parse("15551234567:12@s.whatsapp.net");
        assert_eq!(id.user(), "15551234567");
        assert_eq!(id.server(), Some("s.whatsapp.net"));
        assert_eq!(id.to_string(), "15551234567@s.whatsapp.net");
    }

    #[rstest]
    #[case("15551234567")]
    #[case("+15551234567")]
    #[case(" 15551234567 ")]
    #[case("15551234567@s.whatsapp.net")]
    #[case("15551234567:3@s.whatsapp.net")]
    fn configured_forms_match(#[case] configured: &str) {
        let sender = Identity::parse("15551234567@s.whatsapp.net");
        assert!(sender.matches(configured));
    }

    #[test]
    fn other_user_does_not_match() {
        let sender = Identity::parse("15551234567@s.whatsapp.net");
        assert!(!sender.matches("15559999999"));
        assert!(!sender.matches("1555123456"));
    }

    #[test]
    fn empty_configuration_matches_nobody() {
        let sender = Identity::parse("");
        assert!(!sender.matches(""));
        assert!(!Identity::parse("15551234567").matches("  "));
    }
}
