//! Reply keyboards offered alongside prompts.
//!
//! Button labels double as commands: when a user taps one, the channel
//! delivers the label back as plain text.

/// Main-menu button that starts a plate search.
pub const SEARCH_BUTTON: &str = "🔍 Search by plate";
/// Button shown during a dialog to request its end.
pub const END_DIALOG_BUTTON: &str = "End dialog";
/// Button that shares the user's own phone contact.
pub const SHARE_CONTACT_BUTTON: &str = "Share phone number";
pub const YES_BUTTON: &str = "Yes";
pub const NO_BUTTON: &str = "No";

/// Which keyboard to show with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Idle participants: start a search.
    MainMenu,
    /// Registration: ask for the phone contact.
    ShareContact,
    /// A yes/no question.
    YesNo,
    /// Inside a dialog.
    EndDialog,
    /// Hide any keyboard (free text expected).
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Text,
    RequestContact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Button {
    pub label: &'static str,
    pub kind: ButtonKind,
}

impl Button {
    const fn text(label: &'static str) -> Self {
        Self {
            label,
            kind: ButtonKind::Text,
        }
    }
}

impl Keyboard {
    /// Button rows for this keyboard. Empty for [`Keyboard::Remove`].
    pub fn rows(self) -> Vec<Vec<Button>> {
        match self {
            Self::MainMenu => vec![vec![Button::text(SEARCH_BUTTON)]],
            Self::ShareContact => vec![vec![Button {
                label: SHARE_CONTACT_BUTTON,
                kind: ButtonKind::RequestContact,
            }]],
            Self::YesNo => vec![vec![Button::text(YES_BUTTON), Button::text(NO_BUTTON)]],
            Self::EndDialog => vec![vec![Button::text(END_DIALOG_BUTTON)]],
            Self::Remove => Vec::new(),
        }
    }

    /// Whether the keyboard should disappear after one tap.
    pub fn one_time(self) -> bool {
        matches!(self, Self::ShareContact | Self::YesNo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_keyboard_requests_contact() {
        let rows = Keyboard::ShareContact.rows();
        assert_eq!(rows[0][0].kind, ButtonKind::RequestContact);
        assert!(Keyboard::ShareContact.one_time());
    }

    #[test]
    fn persistent_keyboards() {
        assert!(!Keyboard::MainMenu.one_time());
        assert!(!Keyboard::EndDialog.one_time());
        assert!(Keyboard::Remove.rows().is_empty());
    }
}
