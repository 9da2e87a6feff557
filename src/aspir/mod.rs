//! Authenticated PIR: private retrieval conditioned on the client
//! proving possession of a per-record secret tag.
//!
//! The tags live in an auxiliary *key database* with one slot per
//! retrieval group of the data database. Two variants:
//!
//! - **Single-server AHE.** The client sends a real and a null recursive
//!   query in random order, each with an encrypted auth token and a
//!   commitment to it. The server answers with challenge tokens
//!   (`nested_sub` of the retrieved encrypted tag and the auth token);
//!   the client proves in zero knowledge that its branch's token is a
//!   nested encryption of zero. The null branch exists so a server
//!   cannot run a tagged key database to tell which query is real: if it
//!   tampers, the client silently proves whichever branch still decodes
//!   to zero.
//!
//! - **Two-server XOR.** The client XOR-shares its tag; each server XORs
//!   its share of the retrieved tag with its auth token share and
//!   publishes the result. The audit passes iff all audit tokens XOR to
//!   zero. Soundness is statistical in the tag width.

mod commitment;

pub use commitment::RoCommitment;

use num_bigint::BigUint;
use num_traits::Zero;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ahe::{Ciphertext, DdleqProof, EncLevel, PublicKey, SecretKey};
use crate::database::{Database, DbMetadata, DoublyEncryptedQueryResult};
use crate::error::PirError;
use crate::query::{DoublyEncryptedQuery, QueryShare};
use crate::slot::Slot;

/// Default statistical security parameter, in octets (64 bits).
pub const DEFAULT_SEC_PARAM_BYTES: usize = 8;

// ============================================================================
// AHE variant
// ============================================================================

/// An authenticated query: a real and a null recursive query in random
/// order, each with an encrypted auth token and a commitment binding it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthenticatedQuery {
    pub query0: DoublyEncryptedQuery,
    pub query1: DoublyEncryptedQuery,
    /// Level-1 encryption of the claimed tag (zero for the null query).
    pub auth_token0: Ciphertext,
    pub auth_token1: Ciphertext,
    pub comm0: RoCommitment,
    pub comm1: RoCommitment,
}

impl AuthenticatedQuery {
    fn branch(&self, bit: usize) -> (&Ciphertext, &RoCommitment) {
        if bit == 0 {
            (&self.auth_token0, &self.comm0)
        } else {
            (&self.auth_token1, &self.comm1)
        }
    }
}

/// The server's challenge: one token per branch, each a level-2
/// ciphertext that decrypts to zero iff the branch's claimed tag matches
/// the retrieved one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChalTokens {
    pub token0: Ciphertext,
    pub token1: Ciphertext,
    /// Statistical security parameter in octets.
    pub sec_param: usize,
}

impl ChalTokens {
    fn token(&self, bit: usize) -> &Ciphertext {
        if bit == 0 { &self.token0 } else { &self.token1 }
    }
}

/// The client's response to a challenge: a re-randomization of the
/// chosen branch's token, a DDLEQ argument relating the two, and the
/// randomness of both layers proving the re-randomization encrypts zero.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofToken {
    pub t: Ciphertext,
    pub proof: DdleqProof,
    pub qbit: usize,
    /// Inner-layer randomness of `t`.
    pub r: BigUint,
    /// Outer-layer randomness of `t`.
    pub s: BigUint,
}

impl DbMetadata {
    /// Build an authenticated query against a key database with this
    /// metadata, targeting the tag at `index` and claiming knowledge of
    /// `key_tag`. Returns the query and the bit marking which branch is
    /// real; the client keeps the bit private.
    pub fn new_authenticated_query(
        &self,
        pk: &PublicKey,
        index: usize,
        key_tag: &Slot,
        rng: &mut impl Rng,
    ) -> Result<(AuthenticatedQuery, usize), PirError> {
        let query_real = self.new_doubly_encrypted_query(pk, 1, index, rng)?;
        let query_null = self.new_doubly_encrypted_null_query(pk, 1, rng)?;

        let real_token = pk.encrypt(&BigUint::from_bytes_be(&key_tag.data), rng);
        let null_token = pk.encrypt(&BigUint::zero(), rng);

        let qbit = rng.random_range(0..2usize);
        let ((query0, token0), (query1, token1)) = if qbit == 0 {
            ((query_real, real_token), (query_null, null_token))
        } else {
            ((query_null, null_token), (query_real, real_token))
        };

        let comm0 = RoCommitment::commit(&token0.c, rng);
        let comm1 = RoCommitment::commit(&token1.c, rng);

        Ok((
            AuthenticatedQuery {
                query0,
                query1,
                auth_token0: token0,
                auth_token1: token1,
                comm0,
                comm1,
            },
            qbit,
        ))
    }
}

/// Server side: run both branches against the key database and issue the
/// challenge tokens.
pub fn auth_chal_for_query(
    sec_param: usize,
    key_db: &Database,
    query: &AuthenticatedQuery,
    nprocs: usize,
) -> Result<ChalTokens, PirError> {
    debug!(
        key_db_size = key_db.metadata.db_size,
        sec_param, nprocs, "issuing authentication challenge"
    );

    let row0 = key_db.private_encrypted_query(&query.query0.row, nprocs)?;
    let row1 = key_db.private_encrypted_query(&query.query1.row, nprocs)?;

    let res0 = key_db.private_encrypted_query_over_encrypted_result(&query.query0.col, &row0)?;
    let res1 = key_db.private_encrypted_query_over_encrypted_result(&query.query1.col, &row1)?;

    let key_ct0 = single_ciphertext(&res0)?;
    let key_ct1 = single_ciphertext(&res1)?;

    Ok(ChalTokens {
        token0: res0.pk.nested_sub(key_ct0, &query.auth_token0),
        token1: res1.pk.nested_sub(key_ct1, &query.auth_token1),
        sec_param,
    })
}

/// A tag query must come back as exactly one ciphertext.
fn single_ciphertext(res: &DoublyEncryptedQueryResult) -> Result<&Ciphertext, PirError> {
    if res.slots.len() != 1 {
        return Err(PirError::InvalidResultShape { expected: 1, got: res.slots.len() });
    }
    let cts = &res.slots[0].cts;
    if cts.len() != 1 {
        return Err(PirError::InvalidResultShape { expected: 1, got: cts.len() });
    }
    Ok(&cts[0])
}

/// Client side: prove that the challenge token of the real branch is a
/// nested encryption of zero.
///
/// If exactly one token decodes to non-zero the server tampered with the
/// key database to tell the branches apart; the client then proves
/// whichever branch still decodes to zero, so the tampering learns
/// nothing about the query bit. Both tokens non-zero aborts.
pub fn auth_prove(
    sk: &SecretKey,
    qbit: usize,
    chal: &ChalTokens,
    rng: &mut impl Rng,
) -> Result<ProofToken, PirError> {
    let dec0 = sk.nested_decrypt(&chal.token0);
    let dec1 = sk.nested_decrypt(&chal.token1);

    if !dec0.is_zero() && !dec1.is_zero() {
        return Err(PirError::ServerCheating);
    }

    let qbit = if !dec0.is_zero() || !dec1.is_zero() {
        if dec0.is_zero() { 0 } else { 1 }
    } else {
        qbit
    };

    let ct1 = chal.token(qbit);
    let (ct2, a, b) = sk.nested_randomize(ct1, rng);
    let proof = sk.prove_ddleq(chal.sec_param, ct1, &ct2, &a, &b, rng);

    // open the randomness of both layers of ct2 so the verifier can
    // reconstruct it as a nested encryption of zero
    let s = sk.extract_randomness(&ct2);
    let inner = sk.decrypt_nested_layer(&ct2);
    let r = sk.extract_randomness(&inner);

    Ok(ProofToken { t: ct2, proof, qbit, r, s })
}

/// Server side: verify a proof. Accepts iff the revealed auth token
/// opens its commitment, the DDLEQ argument relates the challenge token
/// to `t`, and `t` reconstructs as a nested encryption of zero under the
/// claimed randomness.
pub fn auth_check(
    pk: &PublicKey,
    query: &AuthenticatedQuery,
    chal: &ChalTokens,
    proof: &ProofToken,
) -> bool {
    if proof.qbit > 1 {
        return false;
    }

    let ct1 = chal.token(proof.qbit);
    let (token, comm) = query.branch(proof.qbit);

    if !comm.check_open(&token.c) {
        return false;
    }

    if !pk.verify_ddleq(ct1, &proof.t, &proof.proof) {
        return false;
    }

    let inner = pk.encrypt_with_r(&BigUint::zero(), &proof.r, EncLevel::One);
    let outer = pk.encrypt_with_r(&inner.c, &proof.s, EncLevel::Two);
    outer.c == proof.t.c
}

// ============================================================================
// XOR-shared variant
// ============================================================================

/// One server's share of the claimed tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthTokenShare {
    pub t: Slot,
}

/// One server's audit contribution: its share of the retrieved tag XORed
/// with its auth token share.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditTokenShare {
    pub t: Slot,
}

/// XOR-share a tag into `num_shares` slots.
pub fn auth_token_shares_for_key(
    auth_key: &Slot,
    num_shares: usize,
    rng: &mut impl Rng,
) -> Vec<AuthTokenShare> {
    let num_bytes = auth_key.len();

    let mut accumulator = Slot::empty(num_bytes);
    let rest: Vec<AuthTokenShare> = (1..num_shares)
        .map(|_| {
            let share = Slot::random(num_bytes, rng);
            accumulator.xor_with(&share);
            AuthTokenShare { t: share }
        })
        .collect();

    accumulator.xor_with(auth_key);
    let mut shares = vec![AuthTokenShare { t: accumulator }];
    shares.extend(rest);
    shares
}

/// Server side: process this server's query share on the key database
/// and fold in its auth token share. The result goes to the other
/// servers (or an auditor).
pub fn generate_audit_for_shared_query(
    key_db: &Database,
    query: &QueryShare,
    auth_token: &AuthTokenShare,
    nprocs: usize,
) -> Result<AuditTokenShare, PirError> {
    let res = key_db.private_secret_shared_query(query, nprocs)?;
    if res.shares.len() != 1 {
        return Err(PirError::InvalidResultShape { expected: 1, got: res.shares.len() });
    }

    let mut t = res.shares.into_iter().next().expect("exactly one share");
    t.xor_with(&auth_token.t);
    Ok(AuditTokenShare { t })
}

/// True iff all audit tokens XOR to the all-zero slot.
pub fn check_audit(audit_tokens: &[AuditTokenShare]) -> bool {
    let Some(first) = audit_tokens.first() else {
        return false;
    };

    let mut acc = Slot::empty(first.t.len());
    for token in audit_tokens {
        acc.xor_with(&token.t);
    }
    acc.is_zero()
}
