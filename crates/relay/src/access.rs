use courier_channels::Identity;

/// Decide whether a sender may have their messages relayed.
///
/// Returns `Ok(())` for the configured sender, or `Err(reason)` if the
/// message should be silently dropped.
pub fn check_sender(sender: &Identity, authorized: Option<&str>) -> Result<(), AccessDenied> {
    let Some(authorized) = authorized.map(str::trim).filter(|a| !a.is_empty()) else {
        // No configured sender authorizes nobody.
        return Err(AccessDenied::NoAuthorizedSender);
    };
    if sender.matches(authorized) {
        Ok(())
    } else {
        Err(AccessDenied::NotAuthorized)
    }
}

/// Reason an inbound message was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    NoAuthorizedSender,
    NotAuthorized,
}

impl std::fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthorizedSender => write!(f, "no authorized sender configured"),
            Self::NotAuthorized => write!(f, "sender is not the authorized sender"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Identity {
        Identity::parse("15551234567:4@s.whatsapp.net")
    }

    #[test]
    fn configured_sender_is_allowed() {
        assert!(check_sender(&sender(), Some("15551234567")).is_ok());
        assert!(check_sender(&sender(), Some("+15551234567")).is_ok());
    }

    #[test]
    fn other_sender_is_denied() {
        assert_eq!(
            check_sender(&sender(), Some("15550000000")),
            Err(AccessDenied::NotAuthorized)
        );
    }

    #[test]
    fn missing_configuration_denies_everyone() {
        assert_eq!(
            check_sender(&sender(), None),
            Err(AccessDenied::NoAuthorizedSender)
        );
        assert_eq!(
            check_sender(&sender(), Some("  ")),
            Err(AccessDenied::NoAuthorizedSender)
        );
    }
}
