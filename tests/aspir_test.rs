//! Integration test for authenticated retrieval: fetch a group of
//! records and prove knowledge of the group's access tag, end to end
//! through the public API.

use aspir::aspir::{
    auth_chal_for_query, auth_check, auth_prove, auth_token_shares_for_key,
    check_audit, generate_audit_for_shared_query, DEFAULT_SEC_PARAM_BYTES,
};
use aspir::{ahe, recover_doubly_encrypted, Database};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[test]
fn test_authenticated_retrieval_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(201);
    let (sk, pk) = ahe::key_gen(128, &mut rng);

    let group_size = 2;
    let data_db = Database::new_random(1 << 8, 5, &mut rng);
    let (dim_width, dim_height) =
        data_db.metadata.optimal_dimensions(group_size).unwrap();
    let num_groups = dim_width / group_size * dim_height;

    // one access tag per retrieval group
    let key_db = Database::new_random(num_groups, DEFAULT_SEC_PARAM_BYTES, &mut rng);
    let q_group = rng.random_range(0..num_groups);

    // retrieval: recursive query for the group
    let query = data_db
        .metadata
        .new_doubly_encrypted_query(&pk, group_size, q_group, &mut rng)
        .unwrap();
    let response = data_db.private_doubly_encrypted_query(&query, 2).unwrap();
    let slots = recover_doubly_encrypted(&response, &sk);

    for (col, slot) in slots.iter().enumerate() {
        let index = q_group * group_size + col;
        if index >= data_db.metadata.db_size {
            break;
        }
        assert_eq!(*slot, data_db.slots[index]);
    }

    // authentication: prove knowledge of the group's tag
    let tag = key_db.slots[q_group].clone();
    let (auth_query, qbit) = key_db
        .metadata
        .new_authenticated_query(&pk, q_group, &tag, &mut rng)
        .unwrap();

    let chal =
        auth_chal_for_query(DEFAULT_SEC_PARAM_BYTES, &key_db, &auth_query, 2).unwrap();
    let proof = auth_prove(&sk, qbit, &chal, &mut rng).unwrap();
    assert!(auth_check(&pk, &auth_query, &chal, &proof));
}

#[test]
fn test_shared_audit_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(202);
    let key_db = Database::new_random(1 << 10, DEFAULT_SEC_PARAM_BYTES, &mut rng);

    let index = rng.random_range(0..key_db.metadata.db_size);
    let tag = key_db.slots[index].clone();

    let token_shares = auth_token_shares_for_key(&tag, 2, &mut rng);
    let query_shares = key_db
        .metadata
        .new_index_query_shares(index, 1, 2, &mut rng)
        .unwrap();

    let audit_a =
        generate_audit_for_shared_query(&key_db, &query_shares[0], &token_shares[0], 2)
            .unwrap();
    let audit_b =
        generate_audit_for_shared_query(&key_db, &query_shares[1], &token_shares[1], 2)
            .unwrap();

    assert!(check_audit(&[audit_a, audit_b]));
}
