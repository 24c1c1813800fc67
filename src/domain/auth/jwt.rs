use super::error::AuthError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifetime of a signed assertion; the identity endpoint rejects longer ones
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String, // Service account ID
    pub aud: String, // Identity endpoint URL
    pub iat: i64,    // Issued at
    pub exp: i64,    // Expiration time
}

/// Map a configured key algorithm to the JWT signing algorithm
pub fn parse_algorithm(name: &str) -> Result<Algorithm, AuthError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "RSA_2048" | "RSA_4096" | "PS256" => Ok(Algorithm::PS256),
        "PS384" => Ok(Algorithm::PS384),
        "PS512" => Ok(Algorithm::PS512),
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        other => Err(AuthError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Env-supplied PEMs often carry literal `\n` sequences instead of line breaks
pub fn expand_pem(raw: &str) -> String {
    raw.replace("\\n", "\n").trim().to_string()
}

/// Service account key pair used to sign identity assertions
pub struct ServiceAccountKey {
    key_id: String,
    service_account_id: String,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: Option<DecodingKey>,
}

impl ServiceAccountKey {
    pub fn from_pem(
        key_id: String,
        service_account_id: String,
        algorithm: Algorithm,
        private_pem: &str,
        public_pem: Option<&str>,
    ) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(expand_pem(private_pem).as_bytes())
            .map_err(|e| AuthError::InvalidKey(format!("private key: {}", e)))?;

        let decoding_key = public_pem
            .map(|pem| {
                DecodingKey::from_rsa_pem(expand_pem(pem).as_bytes())
                    .map_err(|e| AuthError::InvalidKey(format!("public key: {}", e)))
            })
            .transpose()?;

        Ok(Self {
            key_id,
            service_account_id,
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn service_account_id(&self) -> &str {
        &self.service_account_id
    }

    pub fn has_public_key(&self) -> bool {
        self.decoding_key.is_some()
    }

    /// Sign a one-hour assertion addressed to `audience`
    pub fn sign_assertion(&self, audience: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = AssertionClaims {
            iss: self.service_account_id.clone(),
            aud: audience.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };

        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.key_id.clone());

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(format!("Failed to sign assertion: {}", e)))
    }

    /// Validate an assertion against the configured public key and extract its claims
    pub fn verify_assertion(&self, assertion: &str, audience: &str) -> Result<AssertionClaims, AuthError> {
        let decoding_key = self
            .decoding_key
            .as_ref()
            .ok_or_else(|| AuthError::KeyPairMismatch("no public key configured".to_string()))?;

        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[self.service_account_id.as_str()]);

        decode::<AssertionClaims>(assertion, decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::KeyPairMismatch(format!("Invalid assertion: {}", e)))
    }

    /// Sign and verify a probe assertion; a no-op without a public key
    pub fn verify_pair(&self, audience: &str) -> Result<(), AuthError> {
        if !self.has_public_key() {
            return Ok(());
        }
        let probe = self.sign_assertion(audience, Utc::now())?;
        self.verify_assertion(&probe, audience).map(|_| ())
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("key_id", &self.key_id)
            .field("service_account_id", &self.service_account_id)
            .field("algorithm", &self.algorithm)
            .field("private_key", &"<redacted>")
            .field("has_public_key", &self.has_public_key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::decode_header;

    const PRIVATE_PEM: &str = include_str!("../../../tests/fixtures/service_account_private.pem");
    const PUBLIC_PEM: &str = include_str!("../../../tests/fixtures/service_account_public.pem");
    const UNRELATED_PUBLIC_PEM: &str = include_str!("../../../tests/fixtures/unrelated_public.pem");
    const AUDIENCE: &str = "https://iam.example.test/iam/v1/tokens";

    fn key(public: Option<&str>) -> ServiceAccountKey {
        ServiceAccountKey::from_pem(
            "key-id-1".to_string(),
            "service-account-1".to_string(),
            Algorithm::PS256,
            PRIVATE_PEM,
            public,
        )
        .unwrap()
    }

    #[test]
    fn test_assertion_header_and_claims() {
        let key = key(Some(PUBLIC_PEM));
        let now = Utc::now();
        let assertion = key.sign_assertion(AUDIENCE, now).unwrap();

        let header = decode_header(&assertion).unwrap();
        assert_eq!(header.alg, Algorithm::PS256);
        assert_eq!(header.kid.as_deref(), Some("key-id-1"));

        let claims = key.verify_assertion(&assertion, AUDIENCE).unwrap();
        assert_eq!(claims.iss, "service-account-1");
        assert_eq!(claims.aud, AUDIENCE);
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_verify_pair_accepts_matching_keys() {
        assert!(key(Some(PUBLIC_PEM)).verify_pair(AUDIENCE).is_ok());
    }

    #[test]
    fn test_verify_pair_rejects_mismatched_keys() {
        let result = key(Some(UNRELATED_PUBLIC_PEM)).verify_pair(AUDIENCE);
        assert!(matches!(result, Err(AuthError::KeyPairMismatch(_))));
    }

    #[test]
    fn test_verify_pair_without_public_key_is_skipped() {
        assert!(key(None).verify_pair(AUDIENCE).is_ok());
    }

    #[test]
    fn test_escaped_newlines_are_expanded() {
        let escaped = PRIVATE_PEM.trim().replace('\n', "\\n");
        let key = ServiceAccountKey::from_pem(
            "k".to_string(),
            "sa".to_string(),
            Algorithm::PS256,
            &escaped,
            None,
        );
        assert!(key.is_ok());
    }

    #[test]
    fn test_garbage_private_key_is_rejected() {
        let result = ServiceAccountKey::from_pem(
            "k".to_string(),
            "sa".to_string(),
            Algorithm::PS256,
            "not a pem",
            None,
        );
        assert!(matches!(result, Err(AuthError::InvalidKey(_))));
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("RSA_2048").unwrap(), Algorithm::PS256);
        assert_eq!(parse_algorithm("rs256").unwrap(), Algorithm::RS256);
        assert!(matches!(
            parse_algorithm("HS256"),
            Err(AuthError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let rendered = format!("{:?}", key(None));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("BEGIN"));
    }
}
