/// Signing Key Provider
///
/// Holds the RS256 key pair used for access tokens. Keys are read and parsed
/// on first use and cached for the lifetime of the process. Concurrent first
/// callers may each parse the PEM, but only one result is ever stored and
/// every caller gets that one. A failed load is not cached.

use std::sync::OnceLock;

use jsonwebtoken::{DecodingKey, EncodingKey};

use crate::configuration::JwtSettings;
use crate::error::{AppError, ConfigError};

/// Parsed key pair
pub struct SigningKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
}

enum KeySource {
    Files {
        private_key_path: String,
        public_key_path: String,
    },
    Pem {
        private_pem: Vec<u8>,
        public_pem: Vec<u8>,
    },
}

pub struct KeyProvider {
    source: KeySource,
    keys: OnceLock<SigningKeys>,
}

impl KeyProvider {
    /// Keys loaded from the PEM files named in the settings
    pub fn from_settings(settings: &JwtSettings) -> Self {
        Self::from_files(&settings.private_key_path, &settings.public_key_path)
    }

    pub fn from_files(private_key_path: &str, public_key_path: &str) -> Self {
        Self {
            source: KeySource::Files {
                private_key_path: private_key_path.to_string(),
                public_key_path: public_key_path.to_string(),
            },
            keys: OnceLock::new(),
        }
    }

    /// Keys from in-memory PEM (RSA private key, SPKI public key)
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Self {
        Self {
            source: KeySource::Pem {
                private_pem: private_pem.to_vec(),
                public_pem: public_pem.to_vec(),
            },
            keys: OnceLock::new(),
        }
    }

    /// Get the key pair, loading it on first call
    ///
    /// # Errors
    /// Returns a configuration error if a key file is missing or unparsable.
    pub fn keys(&self) -> Result<&SigningKeys, AppError> {
        if let Some(keys) = self.keys.get() {
            return Ok(keys);
        }

        let loaded = self.load()?;
        tracing::info!("Signing keys loaded");
        Ok(self.keys.get_or_init(|| loaded))
    }

    fn load(&self) -> Result<SigningKeys, AppError> {
        let (private_pem, public_pem) = match &self.source {
            KeySource::Files {
                private_key_path,
                public_key_path,
            } => (read_pem(private_key_path)?, read_pem(public_key_path)?),
            KeySource::Pem {
                private_pem,
                public_pem,
            } => (private_pem.clone(), public_pem.clone()),
        };

        let encoding = EncodingKey::from_rsa_pem(&private_pem).map_err(|e| {
            AppError::Config(ConfigError::InvalidValue(format!("private key: {}", e)))
        })?;
        let decoding = DecodingKey::from_rsa_pem(&public_pem).map_err(|e| {
            AppError::Config(ConfigError::InvalidValue(format!("public key: {}", e)))
        })?;

        Ok(SigningKeys { encoding, decoding })
    }
}

fn read_pem(path: &str) -> Result<Vec<u8>, AppError> {
    if path.is_empty() {
        return Err(AppError::Config(ConfigError::MissingRequired(
            "jwt key path".to_string(),
        )));
    }

    std::fs::read(path).map_err(|e| {
        tracing::error!(path = %path, error = %e, "Failed to read key file");
        AppError::Config(ConfigError::InvalidValue(format!("{}: {}", path, e)))
    })
}
