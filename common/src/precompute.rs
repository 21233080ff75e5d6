use std::collections::HashMap;

use curve25519_dalek::{RistrettoPoint, Scalar, ristretto::CompressedRistretto};

/// `x_pows[i - 1] = [1, i, i^2, ..., i^(t-1)]` for every party index `i` in `1..=n`.
pub fn gen_powers(n: usize, t: usize) -> Vec<Vec<Scalar>> {
    (1..=n)
        .map(|i| {
            let x = Scalar::from(i as u64);
            let mut x_powers: Vec<Scalar> = Vec::with_capacity(t);
            x_powers.push(Scalar::ONE);
            for k in 1..t {
                x_powers.push(x_powers[k - 1] * x);
            }
            x_powers
        })
        .collect()
}

/// Baby-step giant-step lookup for `m * G` with `m` in `[0, bound]`.
///
/// Only ever used on public values (decrypted aggregates), so the variable-time
/// arithmetic here leaks nothing secret.
pub struct DiscreteLogTable {
    bound: u64,
    step: u64,
    baby_steps: HashMap<CompressedRistretto, u64>,
    giant_step: RistrettoPoint,
}

impl DiscreteLogTable {
    pub fn new(bound: u64) -> Self {
        let step = (bound as f64).sqrt().ceil() as u64 + 1;
        let g = RistrettoPoint::mul_base(&Scalar::ONE);

        let mut baby_steps = HashMap::with_capacity(step as usize);
        let mut acc = RistrettoPoint::mul_base(&Scalar::ZERO);
        for j in 0..step {
            baby_steps.insert(acc.compress(), j);
            acc += g;
        }

        Self {
            bound,
            step,
            baby_steps,
            giant_step: RistrettoPoint::mul_base(&Scalar::from(step)),
        }
    }

    pub fn bound(&self) -> u64 {
        self.bound
    }

    pub fn get(&self, point: &RistrettoPoint) -> Option<u64> {
        let mut acc = *point;
        let mut i = 0u64;
        while i * self.step <= self.bound {
            if let Some(j) = self.baby_steps.get(&acc.compress()) {
                let m = i * self.step + j;
                return (m <= self.bound).then_some(m);
            }
            acc -= self.giant_step;
            i += 1;
        }
        None
    }
}

#[cfg(test)]
mod test {
    use curve25519_dalek::{RistrettoPoint, Scalar};

    use super::{DiscreteLogTable, gen_powers};

    #[test]
    fn powers_table() {
        let table = gen_powers(4, 3);
        assert_eq!(table.len(), 4);
        assert_eq!(
            table[2],
            vec![Scalar::ONE, Scalar::from(3u64), Scalar::from(9u64)]
        );
    }

    #[test]
    fn finds_every_value_in_range() {
        let table = DiscreteLogTable::new(50);
        for m in 0..=50u64 {
            let point = RistrettoPoint::mul_base(&Scalar::from(m));
            assert_eq!(table.get(&point), Some(m), "m = {m}");
        }
    }

    #[test]
    fn rejects_values_out_of_range() {
        let table = DiscreteLogTable::new(6);
        assert_eq!(table.get(&RistrettoPoint::mul_base(&Scalar::from(7u64))), None);
        assert_eq!(table.get(&RistrettoPoint::mul_base(&Scalar::from(1000u64))), None);
        assert_eq!(table.get(&RistrettoPoint::mul_base(&-Scalar::ONE)), None);
    }

    #[test]
    fn zero_bound() {
        let table = DiscreteLogTable::new(0);
        assert_eq!(table.get(&RistrettoPoint::mul_base(&Scalar::ZERO)), Some(0));
        assert_eq!(table.get(&RistrettoPoint::mul_base(&Scalar::ONE)), None);
    }
}
