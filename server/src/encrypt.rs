use std::io::{Read, Write};

use color_eyre::{
    eyre::{bail, Context as _},
    Result,
};

/// Passphrase encryption for secrets at rest, like OAuth tokens.
#[derive(Debug, Clone)]
pub struct Config {
    secret_key: String,
}

impl Config {
    #[tracing::instrument(name = "encrypt::Config::from_env")]
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            secret_key: std::env::var("ENCRYPTION_SECRET_KEY")
                .wrap_err("Missing ENCRYPTION_SECRET_KEY, needed for encryption")?,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            secret_key: "FAKE_SECRET_KEY".to_string(),
        }
    }

    pub fn encrypt(&self, data: &str) -> Result<Vec<u8>> {
        let encryptor = age::Encryptor::with_user_passphrase(age::secrecy::Secret::new(
            self.secret_key.clone(),
        ));

        let mut encrypted = vec![];
        let mut writer = encryptor.wrap_output(&mut encrypted)?;
        writer.write_all(data.as_bytes())?;
        writer.finish()?;

        Ok(encrypted)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<String> {
        let age::Decryptor::Passphrase(decryptor) = age::Decryptor::new(data)? else {
            bail!("Encrypted data was not passphrase protected");
        };

        let mut decrypted = vec![];
        let mut reader =
            decryptor.decrypt(&age::secrecy::Secret::new(self.secret_key.clone()), None)?;
        reader.read_to_end(&mut decrypted)?;

        String::from_utf8(decrypted).wrap_err("Decrypted data was not UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypts_what_it_encrypts() {
        let config = Config::for_tests();

        let encrypted = config.encrypt("ya29.access-token").unwrap();

        assert_ne!(encrypted, b"ya29.access-token");
        assert_eq!(config.decrypt(&encrypted).unwrap(), "ya29.access-token");
    }

    #[test]
    fn wrong_key_fails() {
        let encrypted = Config::for_tests().encrypt("secret").unwrap();
        let other = Config {
            secret_key: "a different key".to_string(),
        };

        assert!(other.decrypt(&encrypted).is_err());
    }
}
