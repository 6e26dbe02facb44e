//! Q64.96 fixed-point price math.
//!
//! Sqrt prices are `u128` values scaled by 2^96. The tick range is truncated
//! to ±443636 so that every representable sqrt price fits in a `u128`
//! (the full-width ratio at the top tick is just below `u128::MAX`).
//! Intermediate products are widened to 256/512 bits so every result is
//! exact before narrowing.

use alloy_primitives::{U256, U512};

/// Minimum tick index representable with a u128 Q64.96 sqrt price.
pub const MIN_TICK: i32 = -443636;

/// Maximum tick index representable with a u128 Q64.96 sqrt price.
pub const MAX_TICK: i32 = 443636;

/// 2^96, the Q64.96 one.
pub const Q96: u128 = 1 << 96;

/// Lowest usable tick for a given tick spacing.
pub fn min_usable_tick(tick_spacing: i32) -> i32 {
    (MIN_TICK / tick_spacing) * tick_spacing
}

/// Highest usable tick for a given tick spacing.
pub fn max_usable_tick(tick_spacing: i32) -> i32 {
    (MAX_TICK / tick_spacing) * tick_spacing
}

/// Snap a tick onto the spacing grid (truncating toward zero).
pub fn snap_tick_to_spacing(tick: i32, tick_spacing: i32) -> i32 {
    (tick / tick_spacing) * tick_spacing
}

fn u256(x: u128) -> U256 {
    U256::from(x)
}

/// floor(a * b / denominator) with a full 512-bit intermediate.
pub(crate) fn mul_div_u256(a: U256, b: U256, denominator: U256) -> U256 {
    assert!(!denominator.is_zero(), "division by zero");
    let product = U512::from(a) * U512::from(b);
    (product / U512::from(denominator)).to::<U256>()
}

/// ceil(a * b / denominator) with a full 512-bit intermediate.
pub(crate) fn mul_div_ceil_u256(a: U256, b: U256, denominator: U256) -> U256 {
    assert!(!denominator.is_zero(), "division by zero");
    let product = U512::from(a) * U512::from(b);
    let d = U512::from(denominator);
    let quotient = product / d;
    let out = if (product % d).is_zero() {
        quotient
    } else {
        quotient + U512::from(1u8)
    };
    out.to::<U256>()
}

fn div_ceil_u256(a: U256, b: U256) -> U256 {
    let quotient = a / b;
    if (a % b).is_zero() {
        quotient
    } else {
        quotient + U256::from(1u8)
    }
}

/// floor(a * b / denominator), panicking if the result overflows u128.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> u128 {
    mul_div_u256(u256(a), u256(b), u256(denominator)).to::<u128>()
}

/// ceil(a * b / denominator), panicking if the result overflows u128.
pub fn mul_div_ceil(a: u128, b: u128, denominator: u128) -> u128 {
    mul_div_ceil_u256(u256(a), u256(b), u256(denominator)).to::<u128>()
}

/// Apply a signed liquidity delta to an unsigned liquidity amount.
pub fn add_liquidity_delta(liquidity: u128, delta: i128) -> u128 {
    if delta < 0 {
        liquidity
            .checked_sub(delta.unsigned_abs())
            .expect("liquidity underflow")
    } else {
        liquidity
            .checked_add(delta as u128)
            .expect("liquidity overflow")
    }
}

/// sqrt(1.0001^tick) * 2^96.
///
/// Per-bit multiplier ladder evaluated in Q128.128, narrowed to Q64.96
/// rounding up, so adjacent ticks always map to distinct prices.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> u128 {
    assert!((MIN_TICK..=MAX_TICK).contains(&tick), "tick out of range");
    let abs_tick = tick.unsigned_abs();

    let mut ratio: U256 = if abs_tick & 0x1 != 0 {
        u256(0xfffcb933bd6fad37aa2d162d1a594001)
    } else {
        U256::from(1u8) << 128
    };
    if abs_tick & 0x2 != 0 {
        ratio = (ratio * u256(0xfff97272373d413259a46990580e213a)) >> 128;
    }
    if abs_tick & 0x4 != 0 {
        ratio = (ratio * u256(0xfff2e50f5f656932ef12357cf3c7fdcc)) >> 128;
    }
    if abs_tick & 0x8 != 0 {
        ratio = (ratio * u256(0xffe5caca7e10e4e61c3624eaa0941cd0)) >> 128;
    }
    if abs_tick & 0x10 != 0 {
        ratio = (ratio * u256(0xffcb9843d60f6159c9db58835c926644)) >> 128;
    }
    if abs_tick & 0x20 != 0 {
        ratio = (ratio * u256(0xff973b41fa98c081472e6896dfb254c0)) >> 128;
    }
    if abs_tick & 0x40 != 0 {
        ratio = (ratio * u256(0xff2ea16466c96a3843ec78b326b52861)) >> 128;
    }
    if abs_tick & 0x80 != 0 {
        ratio = (ratio * u256(0xfe5dee046a99a2a811c461f1969c3053)) >> 128;
    }
    if abs_tick & 0x100 != 0 {
        ratio = (ratio * u256(0xfcbe86c7900a88aedcffc83b479aa3a4)) >> 128;
    }
    if abs_tick & 0x200 != 0 {
        ratio = (ratio * u256(0xf987a7253ac413176f2b074cf7815e54)) >> 128;
    }
    if abs_tick & 0x400 != 0 {
        ratio = (ratio * u256(0xf3392b0822b70005940c7a398e4b70f3)) >> 128;
    }
    if abs_tick & 0x800 != 0 {
        ratio = (ratio * u256(0xe7159475a2c29b7443b29c7fa6e889d9)) >> 128;
    }
    if abs_tick & 0x1000 != 0 {
        ratio = (ratio * u256(0xd097f3bdfd2022b8845ad8f792aa5825)) >> 128;
    }
    if abs_tick & 0x2000 != 0 {
        ratio = (ratio * u256(0xa9f746462d870fdf8a65dc1f90e061e5)) >> 128;
    }
    if abs_tick & 0x4000 != 0 {
        ratio = (ratio * u256(0x70d869a156d2a1b890bb3df62baf32f7)) >> 128;
    }
    if abs_tick & 0x8000 != 0 {
        ratio = (ratio * u256(0x31be135f97d08fd981231505542fcfa6)) >> 128;
    }
    if abs_tick & 0x10000 != 0 {
        ratio = (ratio * u256(0x9aa508b5b7a84e1c677de54f3e99bc9)) >> 128;
    }
    if abs_tick & 0x20000 != 0 {
        ratio = (ratio * u256(0x5d6af8dedb81196699c329225ee604)) >> 128;
    }
    if abs_tick & 0x40000 != 0 {
        ratio = (ratio * u256(0x2216e584f5fa1ea926041bedfe98)) >> 128;
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up.
    let mask = (U256::from(1u8) << 32) - U256::from(1u8);
    let mut out: U256 = ratio >> 32;
    let remainder: U256 = ratio & mask;
    if !remainder.is_zero() {
        out += U256::from(1u8);
    }
    out.to::<u128>()
}

/// Largest tick whose sqrt ratio is <= the given sqrt price.
///
/// Binary search over the exact ladder, so the result is consistent with
/// `get_sqrt_ratio_at_tick` by construction.
pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: u128) -> i32 {
    assert!(
        sqrt_price_x96 >= get_sqrt_ratio_at_tick(MIN_TICK)
            && sqrt_price_x96 <= get_sqrt_ratio_at_tick(MAX_TICK),
        "sqrt price out of range"
    );
    let mut lo = MIN_TICK;
    let mut hi = MAX_TICK;
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if get_sqrt_ratio_at_tick(mid) <= sqrt_price_x96 {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

fn sort2(a: u128, b: u128) -> (u128, u128) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// Token0 owed across [sqrt_a, sqrt_b] for `liquidity` units.
///
/// amount0 = L * 2^96 * (sqrt_b - sqrt_a) / (sqrt_b * sqrt_a)
pub fn get_amount0_delta(sqrt_a: u128, sqrt_b: u128, liquidity: u128, round_up: bool) -> u128 {
    let (sqrt_a, sqrt_b) = sort2(sqrt_a, sqrt_b);
    assert!(sqrt_a > 0, "sqrt price zero");
    let numerator1 = u256(liquidity) << 96;
    let numerator2 = u256(sqrt_b - sqrt_a);
    let out = if round_up {
        div_ceil_u256(
            mul_div_ceil_u256(numerator1, numerator2, u256(sqrt_b)),
            u256(sqrt_a),
        )
    } else {
        mul_div_u256(numerator1, numerator2, u256(sqrt_b)) / u256(sqrt_a)
    };
    out.to::<u128>()
}

/// Token1 owed across [sqrt_a, sqrt_b] for `liquidity` units.
///
/// amount1 = L * (sqrt_b - sqrt_a) / 2^96
pub fn get_amount1_delta(sqrt_a: u128, sqrt_b: u128, liquidity: u128, round_up: bool) -> u128 {
    let (sqrt_a, sqrt_b) = sort2(sqrt_a, sqrt_b);
    if round_up {
        mul_div_ceil(liquidity, sqrt_b - sqrt_a, Q96)
    } else {
        mul_div(liquidity, sqrt_b - sqrt_a, Q96)
    }
}

/// Liquidity units fundable by `amount0` across [sqrt_a, sqrt_b].
pub fn get_liquidity_for_amount0(sqrt_a: u128, sqrt_b: u128, amount0: u128) -> u128 {
    let (sqrt_a, sqrt_b) = sort2(sqrt_a, sqrt_b);
    assert!(sqrt_a < sqrt_b, "empty price range");
    let intermediate = mul_div_u256(u256(sqrt_a), u256(sqrt_b), u256(Q96));
    mul_div_u256(u256(amount0), intermediate, u256(sqrt_b - sqrt_a)).to::<u128>()
}

/// Liquidity units fundable by `amount1` across [sqrt_a, sqrt_b].
pub fn get_liquidity_for_amount1(sqrt_a: u128, sqrt_b: u128, amount1: u128) -> u128 {
    let (sqrt_a, sqrt_b) = sort2(sqrt_a, sqrt_b);
    assert!(sqrt_a < sqrt_b, "empty price range");
    mul_div(amount1, Q96, sqrt_b - sqrt_a)
}
