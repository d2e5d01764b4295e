use std::fmt::{self, Debug, Formatter};

use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::Error;

/// The claims of a token issued by the session service. `sub` is the id of the user.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: u64,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
}

/// A utility type to handle decoding and validating tokens.
#[derive(Clone)]
pub struct Authorization {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Authorization {
    /// Creates a new `Authorization` instance using the secret and algorithm from `config`.
    pub fn new(config: &config::Authorization) -> Self {
        let mut validation = Validation::new(config.alg);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and validates (signature) a token.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if decoding the token fails. This can happen if the token is
    /// malformed or contains an invalid signature.
    pub fn decode_token<T>(&self, token: T) -> Result<Claims, Error>
    where
        T: AsRef<str>,
    {
        let data = jsonwebtoken::decode(token.as_ref(), &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Decodes and validates a token, including all claims.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if decoding the token fails, any claim is missing or the token
    /// is not valid at the current time.
    pub fn validate<T>(&self, token: T) -> Result<Claims, Error>
    where
        T: AsRef<str>,
    {
        let claims = self.decode_token(token)?;

        let now = Utc::now().timestamp() as u64;

        for claim in [claims.iat, claims.nbf, claims.exp] {
            if claim == 0 {
                return Err(Error::Unauthorized);
            }
        }

        if claims.exp < now || claims.nbf > now {
            return Err(Error::Unauthorized);
        }

        Ok(claims)
    }
}

impl Debug for Authorization {
    #[inline]
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Authorization {{ decoding_key }}")
    }
}
