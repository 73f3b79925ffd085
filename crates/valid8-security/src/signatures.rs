// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Issuer signatures — ECDSA P-256 over the raw document bytes.
//
// Institutions sign the exact file they hand out. A verifier holds the
// public keys of the issuers it trusts and checks a detached signature
// envelope (signer name + hex DER signature) against the uploaded bytes.

use std::collections::BTreeMap;

use ring::rand::SystemRandom;
use ring::signature::{
    ECDSA_P256_SHA256_ASN1, ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair,
    UnparsedPublicKey,
};
use tracing::{debug, info, instrument, warn};
use valid8_core::error::{Result, Valid8Error};
use valid8_core::oracle::{EvidenceQuery, Oracle};
use valid8_core::types::{EvidenceResult, EvidenceSource};

/// Length of an uncompressed SEC1 P-256 public key (0x04 || x || y).
const P256_PUBLIC_KEY_LEN: usize = 65;

fn sig_err(context: &str, err: impl std::fmt::Display) -> Valid8Error {
    Valid8Error::Signature(format!("{context}: {err}"))
}

// ---------------------------------------------------------------------------
// Issuer key pair
// ---------------------------------------------------------------------------

/// An issuing institution's signing key.
///
/// Held as a PKCS#8 v1 DER document; the public half is the uncompressed
/// SEC1 point that verifiers register with [`SignatureOracle::trust`].
pub struct IssuerKeyPair {
    pkcs8_der: Vec<u8>,
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl IssuerKeyPair {
    /// Generate a fresh key pair from the OS CSPRNG.
    #[instrument]
    pub fn generate() -> Result<Self> {
        let rng = SystemRandom::new();
        let document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .map_err(|err| sig_err("key generation failed", err))?;
        let pair = Self::from_pkcs8(document.as_ref())?;
        debug!(pkcs8_len = pair.pkcs8_der.len(), "issuer key pair generated");
        Ok(pair)
    }

    /// Load a PKCS#8 v1 DER private key.
    pub fn from_pkcs8(pkcs8_der: &[u8]) -> Result<Self> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8_der, &rng)
            .map_err(|err| sig_err("key parsing failed", err))?;
        Ok(Self {
            pkcs8_der: pkcs8_der.to_vec(),
            key_pair,
            rng,
        })
    }

    /// Load a hex-encoded PKCS#8 key, as written by `valid8 keygen`.
    pub fn from_pkcs8_hex(pkcs8_hex: &str) -> Result<Self> {
        let der = hex::decode(pkcs8_hex.trim()).map_err(|err| sig_err("private key is not hex", err))?;
        Self::from_pkcs8(&der)
    }

    pub fn pkcs8_der(&self) -> &[u8] {
        &self.pkcs8_der
    }

    pub fn pkcs8_hex(&self) -> String {
        hex::encode(&self.pkcs8_der)
    }

    /// Uncompressed SEC1 public key (65 bytes).
    pub fn public_key(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// ASN.1 DER ECDSA signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .key_pair
            .sign(&self.rng, message)
            .map_err(|err| sig_err("signing failed", err))?;
        Ok(signature.as_ref().to_vec())
    }

    pub fn sign_hex(&self, message: &[u8]) -> Result<String> {
        self.sign(message).map(hex::encode)
    }
}

impl std::fmt::Debug for IssuerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerKeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Signature oracle
// ---------------------------------------------------------------------------

/// Checks signature envelopes against a set of trusted issuer keys.
///
/// Signer names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct SignatureOracle {
    trusted: BTreeMap<String, Vec<u8>>,
}

impl SignatureOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `signer` with the given hex SEC1 public key.
    pub fn trust(mut self, signer: &str, public_key_hex: &str) -> Result<Self> {
        let key = hex::decode(public_key_hex.trim())
            .map_err(|err| sig_err(&format!("public key for {signer} is not hex"), err))?;
        if key.len() != P256_PUBLIC_KEY_LEN || key[0] != 0x04 {
            return Err(Valid8Error::Signature(format!(
                "public key for {signer} is not an uncompressed P-256 point"
            )));
        }
        self.trusted.insert(signer.to_lowercase(), key);
        Ok(self)
    }

    pub fn trusted_signers(&self) -> usize {
        self.trusted.len()
    }

    /// Verify a hex DER signature by `signer` over `message`.
    pub fn verify(&self, signer: &str, signature_hex: &str, message: &[u8]) -> Result<()> {
        let key = self
            .trusted
            .get(&signer.to_lowercase())
            .ok_or_else(|| Valid8Error::Signature(format!("unknown signer: {signer}")))?;
        let signature = hex::decode(signature_hex.trim())
            .map_err(|err| sig_err("signature is not hex", err))?;
        UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, key)
            .verify(message, &signature)
            .map_err(|_| Valid8Error::Signature(format!("signature by {signer} does not match the document")))
    }
}

impl Oracle for SignatureOracle {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::Signature
    }

    #[instrument(skip_all, fields(signer = tracing::field::Empty))]
    fn check(&self, query: &EvidenceQuery) -> Result<EvidenceResult> {
        let Some(envelope) = &query.signature else {
            debug!("no signature attached");
            return Ok(EvidenceResult::not_applicable(EvidenceSource::Signature));
        };
        tracing::Span::current().record("signer", envelope.signer.as_str());

        match self.verify(&envelope.signer, &envelope.signature_hex, query.document.bytes()) {
            Ok(()) => {
                info!("signature verified");
                Ok(EvidenceResult::verified(EvidenceSource::Signature, None))
            }
            Err(err) => {
                warn!(error = %err, "signature rejected");
                Ok(EvidenceResult::failed(EvidenceSource::Signature, err.to_string()))
            }
        }
    }
}
