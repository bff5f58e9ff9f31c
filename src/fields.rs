//! Coefficient arithmetic, carried by operator objects.
//!
//! An element always represents a non-zero value; `0` is represented by the
//! absence of a summand, which is why [`FieldOperators::add`] and
//! [`FieldOperators::mul`] return an `Option`. We avoid requiring an element
//! for `0` to make [`Z2`] columns plain lists of row indices.
//!
//! Matrices own their operator object and thread it through every column
//! operation; there is no global field state, so matrices over different
//! characteristics coexist freely.

use std::fmt::Debug;
use std::hash::Hash;
use std::num::NonZeroU64;

use num::Integer;

use crate::VineaError;

pub trait FieldOperators {
    type Element: Copy + Eq + Hash + Debug;

    fn characteristic(&self) -> u64;
    fn one(&self) -> Self::Element;
    /// Canonical residue of an arbitrary signed value, `None` if it reduces
    /// to the additive identity.
    fn from_value(&self, value: i64) -> Option<Self::Element>;
    /// Canonical representative in `[1, characteristic)`.
    fn value_of(&self, e: Self::Element) -> u64;
    fn add(&self, a: Self::Element, b: Self::Element) -> Option<Self::Element>;
    fn negate(&self, a: Self::Element) -> Self::Element;
    /// Only [`MultiField`] can return `None` here (zero divisors).
    fn mul(&self, a: Self::Element, b: Self::Element) -> Option<Self::Element>;
    fn inverse(&self, a: Self::Element) -> Result<Self::Element, VineaError>;
}

// ======== Z2 =================================================

/// The two element field. Elements are zero-sized: a `Z2` column entry is
/// just a row index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Z2;

/// The unique non-zero element of [`Z2`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Z2One;

impl FieldOperators for Z2 {
    type Element = Z2One;

    fn characteristic(&self) -> u64 {
        2
    }

    fn one(&self) -> Z2One {
        Z2One
    }

    fn from_value(&self, value: i64) -> Option<Z2One> {
        (value.rem_euclid(2) == 1).then_some(Z2One)
    }

    fn value_of(&self, _e: Z2One) -> u64 {
        1
    }

    // 1 + 1 = 0
    fn add(&self, _a: Z2One, _b: Z2One) -> Option<Z2One> {
        None
    }

    fn negate(&self, _a: Z2One) -> Z2One {
        Z2One
    }

    fn mul(&self, _a: Z2One, _b: Z2One) -> Option<Z2One> {
        Some(Z2One)
    }

    fn inverse(&self, _a: Z2One) -> Result<Z2One, VineaError> {
        Ok(Z2One)
    }
}

// ======== Zp for odd primes ==================================

/// The field `Z_p` for a runtime prime `p`.
///
/// The constructor checks primality and bounds `p` below `2^32` so that
/// products of residues fit in a `u64`. For `p = 2` prefer [`Z2`], which
/// stores no coefficients at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimeField {
    p: u64,
}

impl PrimeField {
    pub fn new(p: u64) -> Result<Self, VineaError> {
        if p >= (1 << 32) || !is_prime(p) {
            return Err(VineaError::InvalidCharacteristic(p));
        }
        Ok(PrimeField { p })
    }
}

impl FieldOperators for PrimeField {
    type Element = NonZeroU64;

    fn characteristic(&self) -> u64 {
        self.p
    }

    fn one(&self) -> NonZeroU64 {
        NonZeroU64::MIN
    }

    fn from_value(&self, value: i64) -> Option<NonZeroU64> {
        NonZeroU64::new(value.rem_euclid(self.p as i64) as u64)
    }

    fn value_of(&self, e: NonZeroU64) -> u64 {
        e.get()
    }

    fn add(&self, a: NonZeroU64, b: NonZeroU64) -> Option<NonZeroU64> {
        NonZeroU64::new((a.get() + b.get()) % self.p)
    }

    fn negate(&self, a: NonZeroU64) -> NonZeroU64 {
        NonZeroU64::new(self.p - a.get()).unwrap_or(NonZeroU64::MIN)
    }

    fn mul(&self, a: NonZeroU64, b: NonZeroU64) -> Option<NonZeroU64> {
        // p is prime, so the product of non-zero residues is non-zero
        NonZeroU64::new((a.get() * b.get()) % self.p)
    }

    fn inverse(&self, a: NonZeroU64) -> Result<NonZeroU64, VineaError> {
        let gcd = (a.get() as i64).extended_gcd(&(self.p as i64));
        NonZeroU64::new(gcd.x.rem_euclid(self.p as i64) as u64)
            .ok_or(VineaError::NonInvertible(self.p))
    }
}

// ======== Multi-field ========================================

/// The ring `Z/QZ` for `Q` the product of all primes in an interval,
/// supporting persistence over every one of those primes at once.
///
/// Reductions over this ring use *partial* inverses: for a sub-product `T` of
/// the characteristics, [`partial_inverse`](MultiField::partial_inverse)
/// returns an element acting as the inverse on the primes of `T` that do not
/// divide the argument, together with the sub-product of those primes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiField {
    primes: Vec<u64>,
    product: u64,
    // partials[i] = (Q / p_i)^(p_i - 1) mod Q, the CRT idempotent of p_i
    partials: Vec<u64>,
}

impl MultiField {
    /// Build the ring over all primes in `[min, max]`.
    pub fn new(min: u64, max: u64) -> Result<Self, VineaError> {
        let primes: Vec<u64> = (min..=max).filter(|&n| is_prime(n)).collect();
        if primes.is_empty() {
            return Err(VineaError::EmptyCharacteristicRange { min, max });
        }
        let mut product: u64 = 1;
        for &p in &primes {
            // bounded by i64::MAX so signed residue reduction stays exact
            product = product
                .checked_mul(p)
                .filter(|&q| q <= i64::MAX as u64)
                .ok_or(VineaError::CharacteristicOverflow)?;
        }
        let partials = primes
            .iter()
            .map(|&p| pow_mod(product / p, p - 1, product))
            .collect();
        Ok(MultiField {
            primes,
            product,
            partials,
        })
    }

    pub fn primes(&self) -> &[u64] {
        &self.primes
    }

    /// The element congruent to 1 modulo every prime dividing `sub_product`
    /// and to 0 modulo the others.
    pub fn partial_multiplicative_identity(&self, sub_product: u64) -> u64 {
        let mut id: u64 = 0;
        for (&p, &partial) in self.primes.iter().zip(&self.partials) {
            if sub_product % p == 0 {
                id = add_mod(id, partial, self.product);
            }
        }
        id
    }

    /// Inverse of `e` on the primes of `sub_product` coprime to `e`.
    ///
    /// Returns the partial inverse (or `None` when every prime of
    /// `sub_product` divides `e`) and the sub-product of the primes on which
    /// it acts as an inverse.
    pub fn partial_inverse(
        &self,
        e: NonZeroU64,
        sub_product: u64,
    ) -> (Option<NonZeroU64>, u64) {
        let g = num::integer::gcd(e.get(), sub_product);
        if g == sub_product {
            return (None, 1);
        }
        let qt = sub_product / g;
        let gcd = (e.get() as i64).extended_gcd(&(qt as i64));
        let inv = gcd.x.rem_euclid(qt as i64) as u64;
        let res = mul_mod(
            self.partial_multiplicative_identity(qt),
            inv,
            self.product,
        );
        (NonZeroU64::new(res), qt)
    }
}

impl FieldOperators for MultiField {
    type Element = NonZeroU64;

    fn characteristic(&self) -> u64 {
        self.product
    }

    fn one(&self) -> NonZeroU64 {
        NonZeroU64::MIN
    }

    fn from_value(&self, value: i64) -> Option<NonZeroU64> {
        NonZeroU64::new(value.rem_euclid(self.product as i64) as u64)
    }

    fn value_of(&self, e: NonZeroU64) -> u64 {
        e.get()
    }

    fn add(&self, a: NonZeroU64, b: NonZeroU64) -> Option<NonZeroU64> {
        NonZeroU64::new(add_mod(a.get(), b.get(), self.product))
    }

    fn negate(&self, a: NonZeroU64) -> NonZeroU64 {
        NonZeroU64::new(self.product - a.get()).unwrap_or(NonZeroU64::MIN)
    }

    fn mul(&self, a: NonZeroU64, b: NonZeroU64) -> Option<NonZeroU64> {
        NonZeroU64::new(mul_mod(a.get(), b.get(), self.product))
    }

    fn inverse(&self, a: NonZeroU64) -> Result<NonZeroU64, VineaError> {
        self.partial_inverse(a, self.product)
            .0
            .ok_or(VineaError::NonInvertible(self.product))
    }
}

// ======== Modular helpers ====================================

fn add_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 + b as u128) % m as u128) as u64
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut acc: u64 = 1 % m;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    acc
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}
