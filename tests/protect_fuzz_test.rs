//! Randomised and edge-case tests for credential protection.
//!
//! Checks the round-trip, idempotence and byte-preservation properties of
//! the protector over generated inputs.

use db_toolkit::DbError;
use db_toolkit::protect::{
    ENVELOPE_PREFIX, decrypt, decrypt_password, encrypt, encrypt_password, has_protected_password,
    is_encrypted,
};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Non-empty plaintexts that do not start with the envelope prefix
fn edge_case_plaintexts() -> Vec<String> {
    vec![
        "x".to_string(),
        " ".to_string(),
        "\n\r\t".to_string(),
        "\0".to_string(),
        "üöÄ".repeat(100),
        "пароль🔑".to_string(),
        "'; DROP TABLE users--".to_string(),
        "a".repeat(15),
        "a".repeat(16),
        "a".repeat(17),
        "a".repeat(100_000),
        "Password=inner;Host=h".to_string(),
        "ENCRYPTED".to_string(),
        random_string(1),
        random_string(31),
        random_string(1000),
    ]
}

#[test]
fn test_roundtrip_edge_cases() {
    let key = random_string(24);
    for plaintext in edge_case_plaintexts() {
        let protected = encrypt(&plaintext, &key).unwrap();
        assert!(is_encrypted(&protected));
        assert_eq!(decrypt(&protected, &key).unwrap(), plaintext);
    }
}

#[test]
fn test_roundtrip_random_keys_and_texts() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let key = random_string(rng.gen_range(1..64));
        let plaintext = random_string(rng.gen_range(1..256));
        let protected = encrypt(&plaintext, &key).unwrap();
        assert_eq!(decrypt(&protected, &key).unwrap(), plaintext);
        assert_eq!(encrypt(&protected, &key).unwrap(), protected);
    }
}

#[test]
fn test_keys_of_any_length() {
    for key in ["k", "a much longer key than thirty two bytes in total length", "ключ"] {
        let protected = encrypt("secret", key).unwrap();
        assert_eq!(decrypt(&protected, key).unwrap(), "secret");
    }
}

#[test]
fn test_decrypt_never_panics_on_garbage() {
    let key = "k";
    let mut inputs: Vec<String> = edge_case_plaintexts()
        .into_iter()
        .map(|s| format!("{}{}", ENVELOPE_PREFIX, s))
        .collect();
    inputs.push(ENVELOPE_PREFIX.to_string());
    inputs.push(format!("{}====", ENVELOPE_PREFIX));
    for _ in 0..50 {
        inputs.push(format!("{}{}", ENVELOPE_PREFIX, random_string(64)));
    }

    for input in inputs {
        match decrypt(&input, key) {
            Err(DbError::Decryption) => {}
            // Random bytes can occasionally decrypt to valid padded UTF-8
            Ok(_) => {}
            Err(other) => panic!("unexpected error for {:?}: {}", input, other),
        }
    }
}

#[test]
fn test_password_only_preserves_other_bytes() {
    let key = "descriptor-key";
    let mut rng = rand::thread_rng();
    for _ in 0..100 {
        let host = random_string(rng.gen_range(1..20));
        let password = random_string(rng.gen_range(1..40));
        let descriptor = format!(
            "Driver=postgres;Host={};Port=5432;User Id=svc;Password={};Application Name=a=b",
            host, password
        );

        let protected = encrypt_password(&descriptor, key).unwrap();
        assert!(has_protected_password(&protected));
        assert!(!protected.contains(&format!("Password={};", password)));

        let prefix = format!("Driver=postgres;Host={};Port=5432;User Id=svc;Password=", host);
        assert!(protected.starts_with(&prefix));
        assert!(protected.ends_with(";Application Name=a=b"));

        assert_eq!(decrypt_password(&protected, key).unwrap(), descriptor);
    }
}

#[test]
fn test_descriptor_without_password_is_unchanged() {
    let descriptor = "Driver=sqlite;Data Source=/tmp/app.db";
    assert_eq!(encrypt_password(descriptor, "k").unwrap(), descriptor);
    assert_eq!(decrypt_password(descriptor, "k").unwrap(), descriptor);
    assert!(!has_protected_password(descriptor));
}

#[test]
fn test_multiple_password_fields() {
    let descriptor = "Password=one;Pwd=two;password=three";
    let protected = encrypt_password(descriptor, "k").unwrap();
    assert_eq!(protected.matches(ENVELOPE_PREFIX).count(), 3);
    assert_eq!(decrypt_password(&protected, "k").unwrap(), descriptor);
}
