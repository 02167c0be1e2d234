//! Assembly of `WWW-Authenticate` challenges.
use crate::primitives::pool::Recycle;

/// Capacity of a fresh buffer.
pub(crate) const BUFFER_CAPACITY: usize = 128;

/// Buffers that grew beyond this are not kept.
pub(crate) const BUFFER_MAX_CAPACITY: usize = 1024;

/// The error codes of RFC 6750.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// The request did not have enough authorization data or was otherwise malformed.
    InvalidRequest,

    /// The provided authorization did not grant sufficient priviledges.
    InsufficientScope,

    /// The token is expired, revoked, malformed or otherwise does not meet expectations.
    InvalidToken,
}

/// Everything needed to render the challenge of one gate.
#[derive(Clone, Debug)]
pub(crate) struct Challenge {
    pub(crate) realm: String,
    pub(crate) schemes: Vec<String>,
    pub(crate) explicit: String,
    pub(crate) error: Option<ErrorCode>,
    pub(crate) description: String,
    pub(crate) uri: String,
    pub(crate) scope: String,
}

/// Scratch space for rendering, zeroed before reuse.
#[derive(Debug)]
pub(crate) struct ChallengeBuffer(pub(crate) Vec<u8>);

struct ChallengeHeader<'b> {
    content: &'b mut Vec<u8>,
    first_option: bool,
}

impl ErrorCode {
    /// The code as it appears on the wire.
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InsufficientScope => "insufficient_scope",
            ErrorCode::InvalidToken => "invalid_token",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "invalid_request" => Some(ErrorCode::InvalidRequest),
            "insufficient_scope" => Some(ErrorCode::InsufficientScope),
            "invalid_token" => Some(ErrorCode::InvalidToken),
            _ => None,
        }
    }
}

impl Challenge {
    pub(crate) fn render(&self, content: &mut Vec<u8>) {
        if self.schemes.is_empty() {
            if !self.explicit.is_empty() {
                content.extend_from_slice(self.explicit.as_bytes());
            } else {
                let mut header = ChallengeHeader::new(content, "ApiKey");
                header.add_kvp("realm", &self.realm);
            }
            return;
        }

        for (index, scheme) in self.schemes.iter().enumerate() {
            if index > 0 {
                content.extend_from_slice(b", ");
            }

            let mut header = ChallengeHeader::new(content, scheme);
            header.add_kvp("realm", &self.realm);

            let code = match self.error {
                Some(code) if scheme.eq_ignore_ascii_case("bearer") => code,
                _ => continue,
            };

            header.add_kvp("error", code.description());
            if !self.description.is_empty() {
                header.add_kvp("error_description", &self.description);
            }
            if !self.uri.is_empty() {
                header.add_kvp("error_uri", &self.uri);
            }
            if code == ErrorCode::InsufficientScope {
                header.add_kvp("scope", &self.scope);
            }
        }
    }
}

impl<'b> ChallengeHeader<'b> {
    fn new(content: &'b mut Vec<u8>, scheme: &str) -> Self {
        content.extend_from_slice(scheme.as_bytes());
        ChallengeHeader {
            content,
            first_option: true,
        }
    }

    fn add_kvp(&mut self, key: &str, value: &str) {
        if self.first_option {
            self.content.push(b' ');
            self.first_option = false;
        } else {
            self.content.extend_from_slice(b", ");
        }

        self.content.extend_from_slice(key.as_bytes());
        self.content.push(b'=');
        quote(self.content, value);
    }
}

/// Append a quoted-string, escaping `"` and `\`.
fn quote(content: &mut Vec<u8>, value: &str) {
    content.push(b'"');
    for &byte in value.as_bytes() {
        if byte == b'"' || byte == b'\\' {
            content.push(b'\\');
        }
        content.push(byte);
    }
    content.push(b'"');
}

impl ChallengeBuffer {
    pub(crate) fn new() -> Self {
        ChallengeBuffer(Vec::with_capacity(BUFFER_CAPACITY))
    }

    /// Overwrite the used bytes with zeroes.
    pub(crate) fn scrub(&mut self) {
        self.0.fill(0);
    }
}

impl Recycle for ChallengeBuffer {
    fn recycle(&mut self) {
        self.scrub();
        self.0.clear();
        if self.0.capacity() > BUFFER_MAX_CAPACITY {
            *self = ChallengeBuffer::new();
        }
    }
}
