use std::collections::BTreeMap;

use criterion::{Criterion, criterion_group, criterion_main};
use curve25519_dalek::Scalar;

use common::{
    BENCH_N_T,
    secret_sharing::{Params, combine, evaluate_all, generate, verify_share},
};

fn feldman(c: &mut Criterion) {
    for (n, t) in BENCH_N_T {
        let mut rng = rand::rng();
        let params = Params::new(n, t).unwrap();

        c.bench_function(
            &format!("(n: {}, t: {}) | Feldman VSS | Dealer: Generate", n, t),
            |b| b.iter(|| generate(&mut rng, params)),
        );

        let (f, commitment) = generate(&mut rng, params);
        let shares = evaluate_all(&f, n);

        c.bench_function(
            &format!("(n: {}, t: {}) | Feldman VSS | Dealer: Evaluate Shares", n, t),
            |b| b.iter(|| evaluate_all(&f, n)),
        );

        c.bench_function(
            &format!("(n: {}, t: {}) | Feldman VSS | Party: Verify Share", n, t),
            |b| b.iter(|| assert!(verify_share(n, &shares[n - 1], &commitment))),
        );

        let qualified: BTreeMap<usize, Scalar> = shares
            .iter()
            .enumerate()
            .map(|(i, s)| (i + 1, *s))
            .collect();

        c.bench_function(
            &format!("(n: {}, t: {}) | Feldman VSS | Combine", n, t),
            |b| b.iter(|| combine(&qualified, t).unwrap()),
        );
    }
}

criterion_group!(benches, feldman);
criterion_main!(benches);
