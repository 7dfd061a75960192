use std::io::{Cursor, Read as _, Write as _};
use std::iter;
use std::sync::Arc;

use age::{x25519::Identity, Decryptor, Encryptor};
use base64::Engine as _;
use color_eyre::eyre::{eyre, Result};

/// Encrypts a provider token with age so it can be stored at rest
///
/// Output is base64 so it fits in a TEXT column
pub async fn encrypt(data: &str, key: &Arc<Identity>) -> Result<String> {
    let data_vec = data.as_bytes().to_vec();
    let key = key.clone();

    // age is CPU bound, keep it off the async workers
    let encrypted = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        let recipient = key.to_public();
        let recipients = iter::once(&recipient as &dyn age::Recipient);
        let encryptor = Encryptor::with_recipients(recipients)
            .map_err(|e| eyre!("Failed to create encryptor: {}", e))?;

        let mut encrypted = vec![];
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(|e| eyre!("Failed to create encrypted writer: {}", e))?;

        writer
            .write_all(&data_vec)
            .map_err(|e| eyre!("Failed to write data for encryption: {}", e))?;

        writer
            .finish()
            .map_err(|e| eyre!("Failed to finish encryption: {}", e))?;

        Ok(encrypted)
    })
    .await??;

    Ok(base64::engine::general_purpose::STANDARD.encode(&encrypted))
}

/// Reverses [`encrypt`]
pub async fn decrypt(encrypted_base64: &str, key: &Arc<Identity>) -> Result<String> {
    let encrypted_data = base64::engine::general_purpose::STANDARD
        .decode(encrypted_base64)
        .map_err(|e| eyre!("Failed to decode base64 data: {}", e))?;

    let key = key.clone();

    let decrypted = tokio::task::spawn_blocking(move || -> Result<String> {
        let decryptor = Decryptor::new(Cursor::new(encrypted_data))
            .map_err(|e| eyre!("Failed to create decryptor: {}", e))?;

        let identities = iter::once(key.as_ref() as &dyn age::Identity);
        let mut reader = decryptor
            .decrypt(identities)
            .map_err(|e| eyre!("Failed to decrypt data: {}", e))?;

        let mut decrypted = String::new();
        reader
            .read_to_string(&mut decrypted)
            .map_err(|e| eyre!("Failed to read decrypted data: {}", e))?;

        Ok(decrypted)
    })
    .await??;

    Ok(decrypted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_encrypt_decrypt_roundtrip() {
        let key = Arc::new(Identity::generate());
        let token = "idp-access-token-1234";

        let encrypted = encrypt(token, &key).await.unwrap();
        assert_ne!(encrypted, token);

        let decrypted = decrypt(&encrypted, &key).await.unwrap();
        assert_eq!(decrypted, token);
    }

    #[tokio::test]
    async fn test_decrypt_with_wrong_key_fails() {
        let key = Arc::new(Identity::generate());
        let other = Arc::new(Identity::generate());

        let encrypted = encrypt("secret", &key).await.unwrap();
        assert!(decrypt(&encrypted, &other).await.is_err());
    }
}
