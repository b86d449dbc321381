use crate::repository::MAX_NAME_LEN;

/// Reasons an uploaded file name is rejected.
#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    /// Longer than [`MAX_NAME_LEN`] characters.
    TooLong,
    /// Contains control characters (CR, LF, etc.).
    ControlCharacter,
}

impl FilenameError {
    /// Returns a human-readable error message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::TooLong => "invalid name",
            Self::ControlCharacter => "invalid name: control characters are not allowed",
        }
    }
}

/// Validates the file name supplied with an upload.
///
/// Empty names are accepted; the name only feeds `Content-Disposition` and
/// content-type inference.
pub fn validate_upload_name(name: &str) -> Result<&str, FilenameError> {
    if name.chars().count() > MAX_NAME_LEN {
        return Err(FilenameError::TooLong);
    }

    // Reject ASCII control characters to prevent
    // HTTP header injection (e.g. CRLF in Content-Disposition).
    if name.chars().any(|c| c.is_control()) {
        return Err(FilenameError::ControlCharacter);
    }

    Ok(name)
}

/// Extension of the last path element of `name`, including the dot,
/// percent-encoded so it can be appended to a URL path.
///
/// Returns an empty string when there is no extension.
pub fn public_extension(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let Some(pos) = base.rfind('.') else {
        return String::new();
    };

    // RFC 3986 pchar, minus '%'.
    base[pos..]
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'.'
            | b'_'
            | b'~'
            | b'!'
            | b'$'
            | b'&'
            | b'\''
            | b'('
            | b')'
            | b'*'
            | b'+'
            | b','
            | b';'
            | b'='
            | b':'
            | b'@' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

/// Public id from a requested path segment: everything before the first dot.
pub fn strip_extension(segment: &str) -> &str {
    match segment.find('.') {
        Some(pos) => &segment[..pos],
        None => segment,
    }
}
