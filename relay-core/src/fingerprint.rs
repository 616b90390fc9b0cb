//! Hostname fingerprints for cache filename partitioning
//!
//! Not a security boundary. SHA-1 is the default because it gives the
//! shortest hex string among the supported digests.

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

/// Lowercase hex digest of `hostname`
pub fn fingerprint(hostname: &str, algorithm: HashAlgorithm) -> String {
    let bytes = hostname.as_bytes();
    match algorithm {
        HashAlgorithm::Sha1 => hex::encode(Sha1::digest(bytes)),
        HashAlgorithm::Sha224 => hex::encode(Sha224::digest(bytes)),
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
        HashAlgorithm::Sha384 => hex::encode(Sha384::digest(bytes)),
        HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sha1() {
        assert_eq!(
            fingerprint("abc", HashAlgorithm::Sha1),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_digest_lengths() {
        let host = "host1.example.com";
        assert_eq!(fingerprint(host, HashAlgorithm::Sha1).len(), 40);
        assert_eq!(fingerprint(host, HashAlgorithm::Sha224).len(), 56);
        assert_eq!(fingerprint(host, HashAlgorithm::Sha256).len(), 64);
        assert_eq!(fingerprint(host, HashAlgorithm::Sha384).len(), 96);
        assert_eq!(fingerprint(host, HashAlgorithm::Sha512).len(), 128);
    }

    #[test]
    fn test_deterministic_and_distinct() {
        let a = fingerprint("host1.example.com", HashAlgorithm::default());
        assert_eq!(a, fingerprint("host1.example.com", HashAlgorithm::Sha1));
        assert_ne!(a, fingerprint("host2.example.com", HashAlgorithm::Sha1));
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
