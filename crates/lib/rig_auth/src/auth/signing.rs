//! The process-wide signing identity.
//!
//! A [`Signer`] is built once from [`JwtConfig`] and never changes. Either a
//! shared secret (HS512, issuer `rig`) or a certificate and private key, where
//! the certificate's public key picks the algorithm and its subject common
//! name is the issuer. Verification accepts only that one algorithm.

use std::fmt;
use std::path::Path;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Public};
use openssl::x509::X509;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::claims::{Claims, SubjectClaims, TokenKind};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Issuer of tokens signed with a shared secret.
pub const HMAC_ISSUER: &str = "rig";

/// Algorithm and verification material, for parties that verify tokens
/// without calling back into the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtMethod {
    pub algorithm: Algorithm,
    /// The shared secret, or the PEM certificate.
    pub key: String,
}

pub struct Signer {
    algorithm: Algorithm,
    issuer: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    verification_key: String,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl Signer {
    /// Build from config. Exactly one of `secret` or the certificate/key
    /// pair must be set.
    pub fn from_config(cfg: &JwtConfig) -> AuthResult<Self> {
        match (&cfg.secret, &cfg.certificate_file, &cfg.certificate_key_file) {
            (Some(secret), None, None) => Self::from_secret(secret),
            (None, Some(cert), Some(key)) => {
                Self::from_certificate_pem(&read_pem(cert)?, &read_pem(key)?)
            }
            (None, None, None) => Err(AuthError::Config(
                "missing jwt configuration: set a secret or a certificate and key".into(),
            )),
            (Some(_), _, _) => Err(AuthError::Config(
                "jwt secret and certificate are mutually exclusive".into(),
            )),
            _ => Err(AuthError::Config(
                "jwt certificate and certificate key must be set together".into(),
            )),
        }
    }

    pub fn from_secret(secret: &str) -> AuthResult<Self> {
        if secret.is_empty() {
            return Err(AuthError::Config("jwt secret is empty".into()));
        }
        Ok(Self {
            algorithm: Algorithm::HS512,
            issuer: HMAC_ISSUER.to_string(),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            verification_key: secret.to_string(),
        })
    }

    pub fn from_certificate_pem(cert_pem: &[u8], key_pem: &[u8]) -> AuthResult<Self> {
        let cert = X509::from_pem(cert_pem)?;
        let private = PKey::private_key_from_pem(key_pem)?;
        let public = cert.public_key()?;
        if !public.public_eq(&private) {
            return Err(AuthError::Config(
                "private key does not match the certificate".into(),
            ));
        }

        let issuer = common_name(&cert)?;
        let algorithm = algorithm_for(&public)?;

        let key_err =
            |e: jsonwebtoken::errors::Error| AuthError::Config(format!("signing key: {e}"));
        let public_pem = public.public_key_to_pem()?;
        let (encoding, decoding) = match algorithm {
            Algorithm::RS256 => (
                EncodingKey::from_rsa_pem(&private.rsa()?.private_key_to_pem()?).map_err(key_err)?,
                DecodingKey::from_rsa_pem(&public_pem).map_err(key_err)?,
            ),
            Algorithm::EdDSA => (
                EncodingKey::from_ed_pem(&private.private_key_to_pem_pkcs8()?).map_err(key_err)?,
                DecodingKey::from_ed_pem(&public_pem).map_err(key_err)?,
            ),
            _ => (
                EncodingKey::from_ec_pem(&private.private_key_to_pem_pkcs8()?).map_err(key_err)?,
                DecodingKey::from_ec_pem(&public_pem).map_err(key_err)?,
            ),
        };

        let verification_key = String::from_utf8(cert.to_pem()?)
            .map_err(|e| AuthError::Config(format!("certificate pem: {e}")))?;

        Ok(Self {
            algorithm,
            issuer,
            encoding,
            decoding,
            verification_key,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn jwt_method(&self) -> JwtMethod {
        JwtMethod {
            algorithm: self.algorithm,
            key: self.verification_key.clone(),
        }
    }

    /// Sign `claims`. The subject must be non-nil and the project non-empty.
    pub fn sign<C>(&self, claims: &C) -> AuthResult<String>
    where
        C: SubjectClaims + Serialize,
    {
        if claims.project_id().is_empty() {
            return Err(AuthError::InvalidArgument("invalid token project".into()));
        }
        if claims.subject().is_nil() {
            return Err(AuthError::InvalidArgument("invalid token subject".into()));
        }
        Ok(encode(&Header::new(self.algorithm), claims, &self.encoding)?)
    }

    /// Verify `token` and decode it as a `kind` token.
    pub fn verify<C>(&self, token: &str, kind: TokenKind) -> AuthResult<C>
    where
        C: DeserializeOwned,
    {
        let claims = self.verify_raw(token)?;
        if claims.get("typ").and_then(Value::as_str) != Some(kind.as_str()) {
            return Err(AuthError::PermissionDenied("invalid token type".into()));
        }
        decode_claims(claims)
    }

    /// Verify a token of any kind.
    pub fn verify_any(&self, token: &str) -> AuthResult<Claims> {
        let claims = self.verify_raw(token)?;
        let kind = claims
            .get("typ")
            .cloned()
            .map(serde_json::from_value::<TokenKind>)
            .and_then(Result::ok)
            .ok_or_else(|| AuthError::PermissionDenied("invalid token type".into()))?;
        Ok(match kind {
            TokenKind::Access => Claims::Access(decode_claims(claims)?),
            TokenKind::Refresh => Claims::Refresh(decode_claims(claims)?),
            TokenKind::Project => Claims::Project(decode_claims(claims)?),
        })
    }

    fn verify_raw(&self, token: &str) -> AuthResult<Value> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        let data = decode::<Value>(token, &self.decoding, &validation)?;

        if data.claims.get("iss").and_then(Value::as_str) != Some(self.issuer.as_str()) {
            return Err(AuthError::PermissionDenied("invalid token issuer".into()));
        }
        Ok(data.claims)
    }
}

fn decode_claims<C: DeserializeOwned>(claims: Value) -> AuthResult<C> {
    serde_json::from_value(claims)
        .map_err(|e| AuthError::PermissionDenied(format!("invalid token claims: {e}")))
}

fn read_pem(path: &Path) -> AuthResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| AuthError::Config(format!("read {}: {e}", path.display())))
}

fn common_name(cert: &X509) -> AuthResult<String> {
    cert.subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().to_string().ok())
        .filter(|cn| !cn.is_empty())
        .ok_or_else(|| AuthError::Config("certificate subject has no common name".into()))
}

fn algorithm_for(public: &PKey<Public>) -> AuthResult<Algorithm> {
    match public.id() {
        Id::RSA => Ok(Algorithm::RS256),
        Id::ED25519 => Ok(Algorithm::EdDSA),
        Id::EC => match public.ec_key()?.group().curve_name() {
            Some(Nid::X9_62_PRIME256V1) => Ok(Algorithm::ES256),
            Some(Nid::SECP384R1) => Ok(Algorithm::ES384),
            other => Err(AuthError::Config(format!(
                "unsupported certificate curve {:?}",
                other.map(|nid| nid.as_raw())
            ))),
        },
        other => Err(AuthError::Config(format!(
            "unsupported certificate algorithm {}",
            other.as_raw()
        ))),
    }
}
