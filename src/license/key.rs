use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generates a license key of the form `HIVE-XXXX-XXXX-XXXX-XXXX`
/// (4 uppercase-hex groups) from the OS random source.
pub fn generate_license_key() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "HIVE-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]
    )
}

pub fn is_valid_key_format(key: &str) -> bool {
    let mut parts = key.split('-');
    if parts.next() != Some("HIVE") {
        return false;
    }
    let groups: Vec<&str> = parts.collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|g| g.len() == 4 && g.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()))
}

/// Opaque API-key secret, returned to the caller exactly once.
pub fn generate_api_key_secret() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("sk_hive_{}", BASE64_URL.encode(bytes))
}

/// SHA-256 hex digest of a secret, the only form that is ever stored.
pub fn digest_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_license_key_format() {
        for _ in 0..100 {
            let key = generate_license_key();
            assert!(is_valid_key_format(&key), "bad key: {}", key);
            assert_eq!(key.len(), 24);
        }
    }

    #[test]
    fn test_key_format_rejections() {
        assert!(!is_valid_key_format(""));
        assert!(!is_valid_key_format("HIVE-0000-0000-0000"));
        assert!(!is_valid_key_format("WASP-0000-0000-0000-0000"));
        assert!(!is_valid_key_format("HIVE-zzzz-0000-0000-0000"));
        assert!(!is_valid_key_format("HIVE-abcd-0000-0000-0000"));
        assert!(is_valid_key_format("HIVE-ABCD-1234-EF00-9999"));
    }

    #[test]
    fn test_api_key_secret_prefix_and_uniqueness() {
        let a = generate_api_key_secret();
        let b = generate_api_key_secret();
        assert!(a.starts_with("sk_hive_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_is_stable_hex() {
        let digest = digest_secret("sk_hive_test");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, digest_secret("sk_hive_test"));
        assert_ne!(digest, digest_secret("sk_hive_other"));
    }
}
