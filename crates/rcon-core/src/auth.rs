//! Challenge-response authentication primitives.
//!
//! The password never crosses the wire.  The server mints a random 16-byte
//! challenge; the client proves password knowledge by returning
//! `SHA-256(challenge ‖ password)`.  A captured digest is useless for replay
//! because the next session gets a fresh challenge.
//!
//! The digest algorithm is fixed to SHA-256 on both sides; there is no
//! negotiation and no compatibility shim for any other digest size.

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::protocol::messages::{CHALLENGE_LEN, DIGEST_LEN};

/// Computes the authentication digest for a challenge/password pair.
///
/// Both peers must call this with identical inputs; the server compares the
/// result byte-exactly against the client's `Digest` message.
pub fn challenge_digest(challenge: &[u8; CHALLENGE_LEN], password: &str) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(challenge);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Mints a fresh random challenge for a new session.
pub fn generate_challenge() -> [u8; CHALLENGE_LEN] {
    let mut bytes = [0u8; CHALLENGE_LEN];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Draws a random, nonzero command correlation ID.
///
/// Zero is reserved (it reads as "no command"), and an ID already pending a
/// result must not be reused, so both cases re-draw.
pub fn next_command_id(mut in_use: impl FnMut(u32) -> bool) -> u32 {
    let mut rng = rand::rng();
    loop {
        let id = rng.next_u32();
        if id != 0 && !in_use(id) {
            return id;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
