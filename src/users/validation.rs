use lazy_static::lazy_static;
use regex::Regex;

use crate::error::FieldErrors;

pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;
pub const NAME_MAX_LEN: usize = 150;

pub const REQUIRED: &str = "This field is required.";

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {max} characters.")
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Checks a username against the allowed pattern; `me` is reserved for the profile route.
pub fn check_username(errors: &mut FieldErrors, username: &str) {
    if username.is_empty() {
        errors.add("username", "This field may not be blank.");
        return;
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        errors.add("username", too_long(USERNAME_MAX_LEN));
    }
    if !USERNAME_RE.is_match(username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    if username == "me" {
        errors.add("username", "Username \"me\" is not allowed.");
    }
}

/// Expects an already normalized email.
pub fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.is_empty() {
        errors.add("email", "This field may not be blank.");
        return;
    }
    if email.chars().count() > EMAIL_MAX_LEN {
        errors.add("email", too_long(EMAIL_MAX_LEN));
    }
    if !is_valid_email(email) {
        errors.add("email", "Enter a valid email address.");
    }
}

pub fn check_name(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.chars().count() > NAME_MAX_LEN {
        errors.add(field, too_long(NAME_MAX_LEN));
    }
}
