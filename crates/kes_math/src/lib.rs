// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Exact integer helpers for amount arithmetic. No floating point is allowed
//! anywhere near a balance, so square roots (liquidity shares, protocol fee
//! accrual) are computed over the integers with truncation.

use kes_types::{U256, U512};

/// Integer square root by Newton's method: the largest `r` with `r * r <= x`.
///
/// The input is a full-width product of two reserves, so it is taken as
/// `U512`; the root of any such product fits a `U256`.
pub fn sqrt(value: U512) -> U256 {
    if value < U512::from(2) {
        // sqrt(0) = 0, sqrt(1) = 1.
        let mut limbs = [0u64; 4];
        limbs[0] = value.low_u64();
        return U256(limbs);
    }
    let mut x0 = U512::one() << ((value.bits() + 1) / 2);
    loop {
        let x1 = (value / x0 + x0) >> 1;
        if x1 >= x0 {
            break;
        }
        x0 = x1;
    }
    u512_to_u256(x0)
}

/// Convenience form for values already known to fit 256 bits.
pub fn sqrt_u256(value: U256) -> U256 {
    sqrt(U512::from(value))
}

/// Truncates to the low 256 bits. Callers guarantee the value fits; the
/// high limbs are asserted empty in debug builds.
pub fn u512_to_u256(value: U512) -> U256 {
    let U512(ref limbs) = value;
    debug_assert!(limbs[4..].iter().all(|limb| *limb == 0));
    U256([limbs[0], limbs[1], limbs[2], limbs[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values() {
        for (input, expected) in
            [(0u64, 0u64), (1, 1), (2, 1), (3, 1), (4, 2), (8, 2), (9, 3), (99, 9), (100, 10)]
        {
            assert_eq!(sqrt(U512::from(input)), U256::from(expected), "sqrt({})", input);
        }
    }

    #[test]
    fn perfect_squares_and_neighbours() {
        for root in [1_000u64, 65_535, 1 << 32, u64::MAX] {
            let square = U512::from(root) * U512::from(root);
            assert_eq!(sqrt(square), U256::from(root));
            assert_eq!(sqrt(square - 1), U256::from(root - 1));
            assert_eq!(sqrt(square + 1), U256::from(root));
        }
    }

    #[test]
    fn full_width_product() {
        let a = U256::from(u64::MAX);
        let b = U256::from(u64::MAX - 1);
        let root = sqrt(a.full_mul(b));
        assert!(root.full_mul(root) <= a.full_mul(b));
        let next = root + 1;
        assert!(next.full_mul(next) > a.full_mul(b));
    }
}
