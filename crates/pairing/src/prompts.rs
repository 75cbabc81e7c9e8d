//! User-facing texts.

use carlink_common::Tag;

pub const ANONYMOUS_LABEL: &str = "anonymous driver";

// Menu
pub const IDLE_HINT: &str = "Use \"🔍 Search by plate\" to contact the owner of a car, or /start to register your own plate.";
pub const ENTER_PLATE: &str = "Send the plate number you are looking for.";
pub const INVALID_PLATE: &str = "That does not look like a plate number. Letters and digits only, please.";
pub const CANCELLED: &str = "Cancelled.";
pub const FINISH_DIALOG_FIRST: &str = "Finish the current dialog first.";
pub const TRY_AGAIN: &str = "Something went wrong on our side. Please try again in a moment.";
pub const CONTACT_UNEXPECTED: &str = "Thanks, but I only need your contact during registration.";

// Registration
pub const SHARE_CONTACT: &str = "To register, share your phone number with the button below.";
pub const OWN_CONTACT_ONLY: &str = "Please share your own contact.";
pub const ENTER_OWN_PLATE: &str = "Now send the plate number of your car.";
pub const PLATE_TAKEN: &str = "This plate is already registered by someone else.";
pub const ALLOW_DIRECT: &str = "Show your @username to people who find your car? (yes/no)";
pub const ANSWER_YES_NO: &str = "Please answer yes or no.";

pub fn already_registered(tag: &Tag) -> String {
    format!("You are already registered with plate {tag}.")
}

pub fn registered(tag: &Tag) -> String {
    format!("Done! Plate {tag} is registered. You will be notified when someone looks for it.")
}

// Search
pub const SELF_MATCH: &str = "That is your own plate.";
pub const TARGET_BUSY: &str = "The owner is in another conversation right now. Try again later or send another plate.";
pub const TARGET_UNREACHABLE: &str = "The owner could not be reached. The dialog was not started.";
pub const SOMEONE_FOUND_YOU: &str = "Someone looking for your plate started a dialog. Their messages will appear here; reply to answer.";

pub fn not_registered(tag: &Tag) -> String {
    format!("Plate {tag} is not registered yet. Invite the owner to join!")
}

pub fn found(tag: &Tag, direct: Option<&str>) -> String {
    match direct {
        Some(handle) => format!(
            "Found the owner of {tag} (@{handle}). Send your first message and it will be forwarded."
        ),
        None => format!("Found the owner of {tag}. Send your first message and it will be forwarded."),
    }
}

// Relay
pub const DELIVERED: &str = "✓ Delivered";
pub const DELIVERY_FAILED: &str = "Your message could not be delivered. The dialog has ended.";
pub const PEER_GONE: &str = "The other driver can no longer be reached. The dialog has ended.";
pub const NOT_IN_DIALOG: &str = "You are not in a dialog.";

pub fn relayed(label: Option<&Tag>, text: &str) -> String {
    match label {
        Some(tag) => format!("🚗 {tag}: {text}"),
        None => format!("🚗 {ANONYMOUS_LABEL}: {text}"),
    }
}

// Termination
pub const FIRST_MESSAGE_FIRST: &str = "Send your first message before ending the dialog.";
pub const CONFIRM_END: &str = "The other driver wants to end the dialog. End it? (yes/no)";
pub const CONFIRMATION_PENDING: &str = "Waiting for the other driver to confirm ending the dialog.";
pub const PEER_UNREACHABLE: &str = "The other driver could not be reached. The dialog has ended.";
pub const DIALOG_ENDED: &str = "The dialog has ended.";
pub const END_DECLINED: &str = "The other driver wants to continue the dialog.";
pub const CONTINUING: &str = "OK, the dialog continues.";
pub const NO_CONFIRMATION: &str = "No confirmation arrived in time. The dialog continues.";
pub const DIALOG_RESET: &str = "Your dialog was reset because of an internal error.";

/// Parse a yes/no answer. `None` for anything else.
pub fn parse_answer(text: &str) -> Option<bool> {
    let answer = text.trim().to_lowercase();
    match answer.as_str() {
        "yes" | "y" | "да" => Some(true),
        "no" | "n" | "нет" => Some(false),
        _ => None,
    }
}
