use alloy_primitives::{keccak256, B256};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, PublicKey, SecretKey, SECP256K1,
};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use thiserror::Error;

/// Kind of proof a task asks for.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, IntoPrimitive, TryFromPrimitive,
)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ProofType {
    Chunk = 1,
    Batch = 2,
}

impl std::fmt::Display for ProofType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProofType::Chunk => write!(f, "chunk"),
            ProofType::Batch => write!(f, "batch"),
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, IntoPrimitive, TryFromPrimitive,
)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ProofStatus {
    Ok = 0,
    ProofError = 1,
}

/// Public inputs of one proven chunk, carried alongside the chunk proof so the
/// batch prover can link chunks together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub chain_id: u64,
    pub prev_state_root: B256,
    pub post_state_root: B256,
    pub withdraw_root: B256,
    pub data_hash: B256,
    pub is_padding: bool,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProof {
    #[serde_as(as = "Base64")]
    pub protocol: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub proof: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub instances: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub vk: Vec<u8>,
    pub chunk_info: Option<ChunkInfo>,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProof {
    #[serde_as(as = "Base64")]
    pub proof: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub instances: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub vk: Vec<u8>,
}

/// Outcome of one proving attempt.
///
/// Built only through the constructors, so a successful detail always carries
/// exactly the proof matching its type and a failed one carries none.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofDetail {
    id: String,
    proof_type: ProofType,
    status: ProofStatus,
    error: Option<String>,
    chunk_proof: Option<ChunkProof>,
    batch_proof: Option<BatchProof>,
}

impl ProofDetail {
    pub fn chunk(id: impl Into<String>, proof: ChunkProof) -> Self {
        Self {
            id: id.into(),
            proof_type: ProofType::Chunk,
            status: ProofStatus::Ok,
            error: None,
            chunk_proof: Some(proof),
            batch_proof: None,
        }
    }

    pub fn batch(id: impl Into<String>, proof: BatchProof) -> Self {
        Self {
            id: id.into(),
            proof_type: ProofType::Batch,
            status: ProofStatus::Ok,
            error: None,
            chunk_proof: None,
            batch_proof: Some(proof),
        }
    }

    pub fn failed(id: impl Into<String>, proof_type: ProofType, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            proof_type,
            status: ProofStatus::ProofError,
            error: Some(error.into()),
            chunk_proof: None,
            batch_proof: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn proof_type(&self) -> ProofType {
        self.proof_type
    }

    pub fn status(&self) -> ProofStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn chunk_proof(&self) -> Option<&ChunkProof> {
        self.chunk_proof.as_ref()
    }

    pub fn batch_proof(&self) -> Option<&BatchProof> {
        self.batch_proof.as_ref()
    }

    /// Digest covered by the agent's signature.
    pub fn signing_digest(&self) -> Result<B256, SigningError> {
        let encoded = serde_json::to_vec(self)?;
        Ok(keccak256(encoded))
    }
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("serialize proof detail: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("secp256k1: {0}")]
    Secp(#[from] secp256k1::Error),
}

/// A [`ProofDetail`] signed by the agent key.
///
/// The signature is a 65 byte recoverable ECDSA signature (compact form
/// followed by the recovery id), hex encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofMsg {
    detail: ProofDetail,
    signature: String,
}

impl ProofMsg {
    pub fn sign(detail: ProofDetail, sk: &SecretKey) -> Result<Self, SigningError> {
        let msg = Message::from_digest(detail.signing_digest()?.0);
        let sig = SECP256K1.sign_ecdsa_recoverable(&msg, sk);
        let (rec_id, compact) = sig.serialize_compact();

        let mut raw = [0u8; 65];
        raw[..64].copy_from_slice(&compact);
        raw[64] = rec_id.to_i32() as u8;

        Ok(Self {
            detail,
            signature: hex::encode(raw),
        })
    }

    pub fn detail(&self) -> &ProofDetail {
        &self.detail
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn into_parts(self) -> (ProofDetail, String) {
        (self.detail, self.signature)
    }

    /// Recovers the key that produced the signature.
    pub fn recover_signer(&self) -> Result<PublicKey, SigningError> {
        let raw = hex::decode(&self.signature)
            .map_err(|e| SigningError::MalformedSignature(e.to_string()))?;
        if raw.len() != 65 {
            return Err(SigningError::MalformedSignature(format!(
                "expected 65 bytes, got {}",
                raw.len()
            )));
        }

        let rec_id = RecoveryId::from_i32(raw[64] as i32)?;
        let sig = RecoverableSignature::from_compact(&raw[..64], rec_id)?;
        let msg = Message::from_digest(self.detail.signing_digest()?.0);

        Ok(SECP256K1.recover_ecdsa(&msg, &sig)?)
    }

    pub fn verify(&self, pk: &PublicKey) -> bool {
        self.recover_signer().is_ok_and(|signer| &signer == pk)
    }
}

/// Hex of the compressed public key, the identity the agent logs in with.
pub fn public_key_hex(pk: &PublicKey) -> String {
    hex::encode(pk.serialize())
}
