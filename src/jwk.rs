use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rsa::pkcs1::der::Document;
use rsa::pkcs1::{self, ALGORITHM_OID};
use rsa::pkcs8::spki::SubjectPublicKeyInfoRef;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Every published key advertises RS256, including the encryption key.
pub const ALGORITHM: &str = "RS256";

const PKCS1_LABEL: &str = "RSA PUBLIC KEY";
const SPKI_LABEL: &str = "PUBLIC KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUse {
    Sig,
    Enc,
}

/// A public RSA JSON Web Key. It has no fields for the private
/// parameters (`d`, `p`, `q`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use")]
    pub key_use: KeyUse,
    pub alg: String,
    pub n: String,
    pub e: String,
}

impl Jwk {
    /// RFC 7638 SHA-256 thumbprint, base64url encoded.
    pub fn thumbprint(&self) -> String {
        // Required members only, lexicographic order, no whitespace.
        let canonical = format!(
            r#"{{"e":"{}","kty":"{}","n":"{}"}}"#,
            self.e, self.kty, self.n
        );
        URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
    }
}

/// `{ "keys": [sig, enc] }`, signature key always first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn new(sig: Jwk, enc: Jwk) -> Self {
        Self {
            keys: vec![sig, enc],
        }
    }

    pub fn find(&self, key_use: KeyUse) -> Option<&Jwk> {
        self.keys.iter().find(|jwk| jwk.key_use == key_use)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Convert a PEM encoded RSA public key (SPKI or PKCS#1) into a public JWK.
///
/// The DER structures are decoded directly, so keys of any modulus size are
/// accepted.
pub fn pem_to_jwk(pem: &str, key_use: KeyUse) -> Result<Jwk, String> {
    let (label, document) =
        Document::from_pem(pem.trim()).map_err(|e| format!("Invalid PEM encoding: {e}"))?;

    let (n, e) = match label {
        PKCS1_LABEL => rsa_components(document.as_bytes())?,
        SPKI_LABEL => {
            let spki = SubjectPublicKeyInfoRef::try_from(document.as_bytes())
                .map_err(|e| format!("Invalid SPKI public key: {e}"))?;
            if spki.algorithm.oid != ALGORITHM_OID {
                return Err(format!(
                    "Unsupported key algorithm {}, expected RSA",
                    spki.algorithm.oid
                ));
            }
            let key = spki
                .subject_public_key
                .as_bytes()
                .ok_or_else(|| "SPKI public key has unused bits".to_string())?;
            rsa_components(key)?
        }
        other => return Err(format!("Unsupported PEM label {other:?}")),
    };

    Ok(Jwk {
        kty: "RSA".to_string(),
        key_use,
        alg: ALGORITHM.to_string(),
        n: URL_SAFE_NO_PAD.encode(n),
        e: URL_SAFE_NO_PAD.encode(e),
    })
}

/// Big-endian modulus and exponent of a PKCS#1 `RSAPublicKey`.
fn rsa_components(der: &[u8]) -> Result<(Vec<u8>, Vec<u8>), String> {
    let key = pkcs1::RsaPublicKey::try_from(der)
        .map_err(|e| format!("Invalid PKCS#1 RSA public key: {e}"))?;

    let n = key.modulus.as_bytes();
    let e = key.public_exponent.as_bytes();
    if n.is_empty() || e.is_empty() {
        return Err("RSA public key has an empty modulus or exponent".to_string());
    }

    Ok((n.to_vec(), e.to_vec()))
}
