//! Shared-mailbox detection.
//!
//! A role address like `info@` or `sales.emea@` never resolves to one
//! person, so paying to look it up is wasted credit.

use std::sync::OnceLock;

use regex::Regex;

use crate::util::email_local_part;

fn re_generic_local_part() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Role word alone, or followed by a separator and anything else.
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:info|support|sales|hello|contact|contacts|admin|administrator|team|help|helpdesk|office|billing|accounts|accounting|finance|invoices?|marketing|noreply|no-reply|donotreply|do-not-reply|notifications?|hr|jobs|careers|recruiting|press|media|legal|privacy|security|abuse|service|services|customerservice|enquiries|inquiries|feedback|mail|webmaster|postmaster|hostmaster|root|general|reception|partners|events|orders|ops|operations)(?:[._+\-].*)?$",
        )
        .unwrap()
    })
}

/// True when the address belongs to a role mailbox rather than a person.
pub fn is_generic_mailbox(email: &str) -> bool {
    let local = email_local_part(email);
    !local.is_empty() && re_generic_local_part().is_match(local)
}
