use aspir::{ahe, Database};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_secret_shared_query(c: &mut Criterion) {
    let mut rng = rand::rng();
    let db = Database::new_random(1 << 14, 32, &mut rng);
    let shares = db.metadata.new_index_query_shares(0, 1, 2, &mut rng).unwrap();

    let mut group = c.benchmark_group("secret_shared_query");
    for nprocs in [1usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(nprocs),
            &nprocs,
            |b, &nprocs| {
                b.iter(|| db.private_secret_shared_query(&shares[0], nprocs).unwrap())
            },
        );
    }
    group.finish();
}

fn bench_encrypted_query(c: &mut Criterion) {
    let mut rng = rand::rng();
    let (_, pk) = ahe::key_gen(1024, &mut rng);
    let db = Database::new_empty(1 << 8, 32);
    let query = db.metadata.new_encrypted_query(&pk, 1, 0, &mut rng).unwrap();

    let mut group = c.benchmark_group("encrypted_query");
    group.sample_size(10);
    for nprocs in [1usize, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(nprocs),
            &nprocs,
            |b, &nprocs| b.iter(|| db.private_encrypted_query(&query, nprocs).unwrap()),
        );
    }
    group.finish();
}

fn bench_dpf_eval(c: &mut Criterion) {
    let mut rng = rand::rng();

    let mut group = c.benchmark_group("dpf_two_party_eval");
    for num_bits in [32u32, 64] {
        let client = aspir::dpf::Dpf::client_initialize(num_bits, &mut rng);
        let [key0, _] = client.generate_two_server(1, 1, &mut rng);
        let server = aspir::dpf::Dpf::server_initialize(&client.prf_keys, num_bits);

        group.bench_with_input(
            BenchmarkId::from_parameter(num_bits),
            &num_bits,
            |b, _| {
                let mut x = 0u64;
                b.iter(|| {
                    x = x.wrapping_add(1);
                    server.eval_two_party(0, &key0, x)
                })
            },
        );
    }
    group.finish();
}

fn bench_build_db(c: &mut Criterion) {
    let mut rng = rand::rng();
    c.bench_function("build_db_1M_slots", |b| {
        b.iter(|| Database::new_random(1 << 20, 3, &mut rng))
    });
}

criterion_group!(
    benches,
    bench_secret_shared_query,
    bench_encrypted_query,
    bench_dpf_eval,
    bench_build_db
);
criterion_main!(benches);
