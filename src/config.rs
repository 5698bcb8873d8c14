use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::pki::VerifierOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub trust: TrustConfig,
    #[serde(default)]
    pub verifier: VerifierOptions,
    #[serde(default)]
    pub revocation: RevocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Directory of trusted root certificates, PEM or DER
    pub certs_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevocationConfig {
    /// Directory of CRL files prepared by the CRL collaborator
    #[serde(default)]
    pub crl_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("trust.certs_dir", "config/certs")?
            .set_default("verifier.check_issuer_validity", false)?
            .add_source(File::with_name("config/settings").required(false));

        // Explicit overrides replace the process environment so tests do not
        // see each other's variables
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // DSV_TRUST__CERTS_DIR, DSV_VERIFIER__CHECK_ISSUER_VALIDITY, ...
            builder = builder.add_source(
                Environment::with_prefix("DSV")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        builder.build()?.try_deserialize()
    }
}
