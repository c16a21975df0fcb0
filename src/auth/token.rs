use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Mints and checks bearer tokens of the form `<user_id>.<expires>.<signature>`,
/// where `expires` is a unix timestamp and `signature` is hex HMAC-SHA256 over
/// the first two parts.
#[derive(Clone)]
pub struct TokenProvider {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl TokenProvider {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn create_token(&self, user_id: i64) -> String {
        let expires = Utc::now().timestamp().saturating_add(self.ttl_secs);
        self.sign(user_id, expires)
    }

    /// Returns the user id the token was minted for, if the signature holds
    /// and it has not expired.
    pub fn verify(&self, token: &str) -> Option<i64> {
        let mut parts = token.splitn(3, '.');
        let user_part = parts.next()?;
        let expires_part = parts.next()?;
        let signature = hex::decode(parts.next()?).ok()?;

        let mut mac = self.mac();
        mac.update(format!("{}.{}", user_part, expires_part).as_bytes());
        mac.verify_slice(&signature).ok()?;

        let expires: i64 = expires_part.parse().ok()?;
        if expires <= Utc::now().timestamp() {
            return None;
        }
        user_part.parse().ok()
    }

    fn sign(&self, user_id: i64, expires: i64) -> String {
        let payload = format!("{}.{}", user_id, expires);
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        format!("{}.{}", payload, hex::encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }
}

/// Random 32-byte hex secret for when none is configured.
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}
