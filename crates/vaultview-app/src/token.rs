//! Share-token decryption.
//!
//! A share link carries a base64 token in the `Talha` query parameter:
//! `base64( nonce[12] || ciphertext+tag )`, AES-256-GCM, no associated data.
//! The plaintext is UTF-8 JSON `{"url": string, "name"?: string}`. Tokens are
//! produced by an external encoder; the format is frozen.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use thiserror::Error;

/// Query parameter carrying the token (shared constant with the encoder).
pub const TOKEN_PARAM: &str = "Talha";

/// Passphrase space-padded to 32 bytes forms the AES-256 key. Deliberately
/// weak, but changing it breaks every token the external encoder has issued.
const PASSPHRASE: &str = "Talha<what!";

const NONCE_LEN: usize = 12;

fn key_bytes() -> [u8; 32] {
    let mut key = [b' '; 32];
    key[..PASSPHRASE.len()].copy_from_slice(PASSPHRASE.as_bytes());
    key
}

/// What a token decrypts to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaDescriptor {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl MediaDescriptor {
    /// Display title for the window.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Talha's Stream")
    }
}

/// Single opaque failure for every decode problem. The caller only learns
/// "usable" vs "not usable"; the cause (bad base64, tag mismatch, bad JSON)
/// is never distinguished.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("decryption failed or invalid data")]
pub struct DecodeError;

/// Decrypt and parse a share token into a media descriptor.
pub fn decode(token: &str) -> Result<MediaDescriptor, DecodeError> {
    let raw = STANDARD.decode(token.trim()).map_err(|_| DecodeError)?;
    if raw.len() <= NONCE_LEN {
        return Err(DecodeError);
    }
    let (nonce, ciphertext) = raw.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(&key_bytes()).map_err(|_| DecodeError)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| DecodeError)?;

    let descriptor: MediaDescriptor =
        serde_json::from_slice(&plaintext).map_err(|_| DecodeError)?;
    if descriptor.url.is_empty() {
        return Err(DecodeError);
    }
    Ok(descriptor)
}

/// Terminal startup failures. The Display strings are the user-visible
/// dialog texts.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No video data found in URL.")]
    MissingToken,
    #[error("Failed to load video: {0}")]
    Decode(#[from] DecodeError),
}

/// Resolve the CLI argument into a media descriptor.
///
/// The argument is either a full share link (token extracted from the
/// [`TOKEN_PARAM`] query parameter) or a bare token. Resolution happens at
/// most once per process, before any window exists.
pub fn resolve(arg: Option<&str>) -> Result<MediaDescriptor, ResolveError> {
    let arg = arg
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ResolveError::MissingToken)?;

    let token = if arg.contains('?') || arg.contains("://") {
        token_from_link(arg).ok_or(ResolveError::MissingToken)?
    } else {
        arg.to_string()
    };
    Ok(decode(&token)?)
}

/// Pull the token out of a share link's query string.
fn token_from_link(link: &str) -> Option<String> {
    let (_, query) = link.split_once('?')?;
    let query = query.split('#').next().unwrap_or(query);
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == TOKEN_PARAM && !value.is_empty() {
            return Some(percent_decode(value));
        }
    }
    None
}

/// Minimal application/x-www-form-urlencoded decoding: `+` is a space,
/// `%XX` is a byte. Matches what the encoder's links go through.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                // Decode the hex digits from the raw bytes; slicing the str
                // here could land inside a multibyte character.
                let hi = (bytes[i + 1] as char).to_digit(16);
                let lo = (bytes[i + 2] as char).to_digit(16);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi * 16 + lo) as u8);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::aead::rand_core::RngCore;
    use aes_gcm::aead::OsRng;

    /// Build a token the way the external encoder does.
    fn encode_token(plaintext: &str) -> String {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let cipher = Aes256Gcm::new_from_slice(&key_bytes()).unwrap();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .unwrap();
        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        STANDARD.encode(blob)
    }

    #[test]
    fn decode_roundtrip() {
        let token = encode_token(r#"{"url":"a.mp4","name":"Demo"}"#);
        let d = decode(&token).unwrap();
        assert_eq!(d.url, "a.mp4");
        assert_eq!(d.name.as_deref(), Some("Demo"));
        assert_eq!(d.display_name(), "Demo");
    }

    #[test]
    fn decode_without_name_uses_default_title() {
        let token = encode_token(r#"{"url":"https://cdn.example/v.m3u8"}"#);
        let d = decode(&token).unwrap();
        assert_eq!(d.name, None);
        assert_eq!(d.display_name(), "Talha's Stream");
    }

    #[test]
    fn decode_rejects_tampered_ciphertext() {
        let token = encode_token(r#"{"url":"a.mp4"}"#);
        let mut raw = STANDARD.decode(&token).unwrap();
        // Flip one bit in the ciphertext region; the tag must catch it.
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert_eq!(decode(&STANDARD.encode(raw)), Err(DecodeError));
    }

    #[test]
    fn decode_rejects_garbage_inputs() {
        assert_eq!(decode("not base64!!"), Err(DecodeError));
        assert_eq!(decode(""), Err(DecodeError));
        // Valid base64 but shorter than a nonce
        assert_eq!(decode(&STANDARD.encode([0u8; 8])), Err(DecodeError));
        // Nonce-length payload with no ciphertext at all
        assert_eq!(decode(&STANDARD.encode([0u8; NONCE_LEN])), Err(DecodeError));
    }

    #[test]
    fn decode_rejects_non_json_plaintext() {
        let token = encode_token("this is not json");
        assert_eq!(decode(&token), Err(DecodeError));
    }

    #[test]
    fn decode_rejects_missing_or_empty_url() {
        assert_eq!(decode(&encode_token(r#"{"name":"x"}"#)), Err(DecodeError));
        assert_eq!(decode(&encode_token(r#"{"url":""}"#)), Err(DecodeError));
    }

    #[test]
    fn error_message_is_collapsed() {
        assert_eq!(DecodeError.to_string(), "decryption failed or invalid data");
    }

    #[test]
    fn resolve_missing_argument() {
        assert!(matches!(resolve(None), Err(ResolveError::MissingToken)));
        assert!(matches!(resolve(Some("  ")), Err(ResolveError::MissingToken)));
    }

    #[test]
    fn resolve_link_without_parameter() {
        let r = resolve(Some("https://play.example/watch?other=1"));
        assert!(matches!(r, Err(ResolveError::MissingToken)));
        let r = resolve(Some("https://play.example/watch"));
        assert!(matches!(r, Err(ResolveError::MissingToken)));
    }

    #[test]
    fn resolve_bare_token_and_link() {
        let token = encode_token(r#"{"url":"a.mp4","name":"Demo"}"#);
        assert_eq!(resolve(Some(&token)).unwrap().url, "a.mp4");

        let link = format!("https://play.example/watch?x=1&{TOKEN_PARAM}={token}");
        assert_eq!(resolve(Some(&link)).unwrap().url, "a.mp4");
    }

    #[test]
    fn resolve_percent_encoded_token() {
        let token = encode_token(r#"{"url":"a.mp4"}"#);
        let encoded: String = token
            .chars()
            .map(|c| match c {
                '+' => "%2B".to_string(),
                '/' => "%2F".to_string(),
                '=' => "%3D".to_string(),
                c => c.to_string(),
            })
            .collect();
        let link = format!("https://play.example/watch?{TOKEN_PARAM}={encoded}");
        assert_eq!(resolve(Some(&link)).unwrap().url, "a.mp4");
    }

    #[test]
    fn percent_decode_tolerates_malformed_escapes() {
        assert_eq!(percent_decode("%41+%62"), "A b");
        // A bad escape passes through literally, even when the following
        // character is multibyte
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("%aü"), "%aü");
        assert_eq!(percent_decode("abc%"), "abc%");
        assert_eq!(percent_decode("%é1"), "%é1");
    }

    #[test]
    fn resolve_survives_malformed_escape_in_link() {
        // Must fail cleanly, not crash on a mid-character byte offset
        let r = resolve(Some("https://play.example/watch?Talha=%aü"));
        assert!(r.is_err());
    }

    #[test]
    fn resolve_messages_match_dialog_text() {
        assert_eq!(
            ResolveError::MissingToken.to_string(),
            "No video data found in URL."
        );
        assert_eq!(
            ResolveError::Decode(DecodeError).to_string(),
            "Failed to load video: decryption failed or invalid data"
        );
    }
}
