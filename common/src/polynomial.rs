use curve25519_dalek::{RistrettoPoint, Scalar};

use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::random::random_scalars;

/// Secret polynomial `f(x) = sum_k coefficients[k] * x^k`; `coefficients[0]` is the secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Polynomial {
    coefficients: Vec<Scalar>,
}

impl Polynomial {
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coef_ref(&self) -> &[Scalar] {
        &self.coefficients
    }

    pub fn coef_at_unchecked(&self, index: usize) -> &Scalar {
        &self.coefficients[index]
    }

    pub fn from_coefficients(coefs: Vec<Scalar>) -> Self {
        Self {
            coefficients: coefs,
        }
    }

    /// `t` coefficients, i.e. degree `t - 1`.
    pub fn sample<R>(t: usize, rng: &mut R) -> Self
    where
        R: CryptoRng + RngCore,
    {
        Polynomial::from_coefficients(random_scalars(rng, t))
    }

    pub fn evaluate(&self, x: usize) -> Scalar {
        let x = Scalar::from(x as u64);

        // Horner
        self.coefficients
            .iter()
            .rev()
            .fold(Scalar::ZERO, |acc, coef| acc * x + coef)
    }

    // x_pows as produced by precompute::gen_powers; entry i - 1 holds the powers of i
    pub fn evaluate_range_precomp(
        &self,
        x_pows: &[Vec<Scalar>],
        from: usize,
        to: usize,
    ) -> Vec<Scalar> {
        (from..=to)
            .into_par_iter()
            .map(|i| {
                self.coefficients
                    .iter()
                    .zip(&x_pows[i - 1])
                    .map(|(coef, x_pow)| coef * x_pow)
                    .sum()
            })
            .collect()
    }

    pub fn evaluate_range(&self, from: usize, to: usize) -> Vec<Scalar> {
        (from..=to).into_par_iter().map(|i| self.evaluate(i)).collect()
    }

    /// Feldman commitment: `coefficients[k] * G` for every `k`.
    pub fn commit(&self) -> Vec<RistrettoPoint> {
        self.coefficients
            .par_iter()
            .map(RistrettoPoint::mul_base)
            .collect()
    }
}

impl std::fmt::Debug for Polynomial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Polynomial {{ degree: {}, .. }}", self.len().saturating_sub(1))
    }
}

#[cfg(test)]
mod test {
    use curve25519_dalek::{RistrettoPoint, Scalar};

    use crate::{polynomial::Polynomial, precompute::gen_powers};

    #[test]
    fn evaluate_known_polynomial() {
        // f1(x) = 13x^3 + 2x^2 + 7x + 128
        let f1 = Polynomial::from_coefficients(vec![
            128u8.into(),
            7u8.into(),
            2u8.into(),
            13u8.into(),
        ]);

        // f2(x) = 81x^3 + 7x^2 + 153x + 32
        let f2 = Polynomial::from_coefficients(vec![
            32u8.into(),
            153u8.into(),
            7u8.into(),
            81u8.into(),
        ]);

        assert_eq!(f1.evaluate(5), Scalar::from(1838u16));
        assert_eq!(f2.evaluate(5), Scalar::from(11097u16));
        assert_eq!(f1.evaluate(0), Scalar::from(128u16));
    }

    #[test]
    fn precomputed_evaluation_agrees() {
        let mut rng = rand::rng();
        let n = 9;
        let t = 4;
        let f = Polynomial::sample(t, &mut rng);
        let x_pows = gen_powers(n, t);

        assert_eq!(f.evaluate_range_precomp(&x_pows, 1, n), f.evaluate_range(1, n));
        assert_eq!(f.evaluate_range(3, 3), vec![f.evaluate(3)]);
    }

    #[test]
    fn commitment_matches_coefficients() {
        let mut rng = rand::rng();
        let f = Polynomial::sample(3, &mut rng);
        let c = f.commit();

        assert_eq!(c.len(), 3);
        for (k, ck) in c.iter().enumerate() {
            assert_eq!(*ck, RistrettoPoint::mul_base(f.coef_at_unchecked(k)));
        }
    }
}
