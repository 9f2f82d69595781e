//! Small composable field checks. Each returns the message to attach to
//! the offending field; forms decide which fields run which checks.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

pub fn required(value: &str, message: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(message.to_string());
    }

    Ok(())
}

pub fn length_between(value: &str, min: usize, max: usize) -> Result<(), String> {
    let chars = value.chars().count();
    if chars < min || chars > max {
        return Err(format!("Must be between {min} and {max} characters"));
    }

    Ok(())
}

pub fn max_length(value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!("Must be at most {max} characters"));
    }

    Ok(())
}

pub fn email_syntax(email: &str) -> Result<(), String> {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

pub fn equals(value: &str, other: &str, message: &str) -> Result<(), String> {
    if value != other {
        return Err(message.to_string());
    }

    Ok(())
}

/// Case-insensitive extension whitelist for uploads.
pub fn allowed_extension(filename: &str, allowed: &[&str]) -> Result<(), String> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    match extension {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
        _ => Err(format!("Allowed file types: {}", allowed.join(", "))),
    }
}
