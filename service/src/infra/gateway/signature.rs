//! Payment proof signature verification.
//!
//! The gateway proves a payment happened by signing
//! `"{order_id}|{payment_id}"` with the shared secret (HMAC-SHA256, hex).
//! Verification recomputes the digest and compares in constant time; this is
//! the single most security-critical check of the pipeline.

use hmac::{Hmac, Mac as _};
use sha2::Sha256;

use crate::domain::transaction;

/// HMAC-SHA256 keyed hash.
type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded payment proof signature for the provided order
/// and payment IDs.
#[must_use]
pub fn sign(
    secret: &[u8],
    order_id: &transaction::OrderId,
    payment_id: &transaction::PaymentId,
) -> String {
    hex::encode(mac(secret, order_id, payment_id).finalize().into_bytes())
}

/// Verifies the provided hex-encoded payment proof signature.
///
/// Undecodable input counts as a mismatch; the digest comparison itself is
/// constant-time.
#[must_use]
pub fn verify(
    secret: &[u8],
    order_id: &transaction::OrderId,
    payment_id: &transaction::PaymentId,
    provided: &str,
) -> bool {
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    mac(secret, order_id, payment_id).verify_slice(&provided).is_ok()
}

/// Initializes the keyed hash over the signature payload.
fn mac(
    secret: &[u8],
    order_id: &transaction::OrderId,
    payment_id: &transaction::PaymentId,
) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key size"));
    mac.update(AsRef::<str>::as_ref(order_id).as_bytes());
    mac.update(b"|");
    mac.update(AsRef::<str>::as_ref(payment_id).as_bytes());
    mac
}

#[cfg(test)]
mod spec {
    use crate::domain::transaction;

    use super::{sign, verify};

    const SECRET: &[u8] = b"test-gateway-secret";

    fn order() -> transaction::OrderId {
        transaction::OrderId::new("order_N5lT9MPGbCfnmB").unwrap()
    }

    fn payment() -> transaction::PaymentId {
        transaction::PaymentId::new("pay_29QQoUBi66xm2f").unwrap()
    }

    #[test]
    fn round_trip() {
        let sig = sign(SECRET, &order(), &payment());
        assert!(verify(SECRET, &order(), &payment(), &sig));
    }

    #[test]
    fn mismatched_payment_id_fails() {
        let sig = sign(SECRET, &order(), &payment());
        let other = transaction::PaymentId::new("pay_forged").unwrap();

        assert!(!verify(SECRET, &order(), &other, &sig));
    }

    #[test]
    fn mismatched_secret_fails() {
        let sig = sign(b"other-secret", &order(), &payment());
        assert!(!verify(SECRET, &order(), &payment(), &sig));
    }

    #[test]
    fn undecodable_signature_fails() {
        assert!(!verify(SECRET, &order(), &payment(), "not hex"));
        assert!(!verify(SECRET, &order(), &payment(), ""));
    }
}
