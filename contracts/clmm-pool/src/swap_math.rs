//! Single-step swap math: how far an exact input moves the price within one
//! stretch of constant liquidity, and what it pays/receives doing so.

use alloy_primitives::U256;

use crate::math::{
    get_amount0_delta, get_amount1_delta, mul_div, mul_div_ceil, mul_div_ceil_u256, Q96,
};

/// Fee denominator: fees are expressed in hundredths of a basis point.
pub const FEE_DENOMINATOR: u32 = 1_000_000;

/// Outcome of one swap step.
pub struct SwapStep {
    pub sqrt_price_next_x96: u128,
    pub amount_in: u128,
    pub amount_out: u128,
    pub fee_amount: u128,
}

/// Advance the price from `sqrt_price_current` toward `sqrt_price_target`
/// (the nearer of the next initialized tick and the caller's limit),
/// consuming at most `amount_remaining` of input at `fee_pips`.
pub fn compute_swap_step(
    sqrt_price_current: u128,
    sqrt_price_target: u128,
    liquidity: u128,
    amount_remaining: u128,
    fee_pips: u32,
) -> SwapStep {
    let zero_for_one = sqrt_price_current >= sqrt_price_target;
    let amount_remaining_less_fee = mul_div(
        amount_remaining,
        (FEE_DENOMINATOR - fee_pips) as u128,
        FEE_DENOMINATOR as u128,
    );

    let amount_in_to_target = if zero_for_one {
        get_amount0_delta(sqrt_price_target, sqrt_price_current, liquidity, true)
    } else {
        get_amount1_delta(sqrt_price_current, sqrt_price_target, liquidity, true)
    };

    let (sqrt_price_next_x96, amount_in) = if amount_remaining_less_fee >= amount_in_to_target {
        (sqrt_price_target, amount_in_to_target)
    } else {
        let next = get_next_sqrt_price_from_input(
            sqrt_price_current,
            liquidity,
            amount_remaining_less_fee,
            zero_for_one,
        );
        let amount_in = if zero_for_one {
            get_amount0_delta(next, sqrt_price_current, liquidity, true)
        } else {
            get_amount1_delta(sqrt_price_current, next, liquidity, true)
        };
        (next, amount_in)
    };

    let reached_target = sqrt_price_next_x96 == sqrt_price_target;
    let amount_out = if zero_for_one {
        get_amount1_delta(sqrt_price_next_x96, sqrt_price_current, liquidity, false)
    } else {
        get_amount0_delta(sqrt_price_current, sqrt_price_next_x96, liquidity, false)
    };

    // When the step stops short of the target the entire leftover input is
    // fee; otherwise the fee is grossed up from the consumed amount.
    let fee_amount = if !reached_target {
        amount_remaining - amount_in
    } else {
        mul_div_ceil(
            amount_in,
            fee_pips as u128,
            (FEE_DENOMINATOR - fee_pips) as u128,
        )
    };

    SwapStep {
        sqrt_price_next_x96,
        amount_in,
        amount_out,
        fee_amount,
    }
}

/// Price after consuming `amount_in` of input at constant `liquidity`.
pub fn get_next_sqrt_price_from_input(
    sqrt_price_x96: u128,
    liquidity: u128,
    amount_in: u128,
    zero_for_one: bool,
) -> u128 {
    assert!(sqrt_price_x96 > 0, "sqrt price zero");
    assert!(liquidity > 0, "no liquidity");
    if zero_for_one {
        next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_in)
    } else {
        next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_in)
    }
}

// next = ceil(L * 2^96 * sqrtP / (L * 2^96 + amount * sqrtP))
// Rounded up so the pool never undercharges token0 input.
fn next_sqrt_price_from_amount0_rounding_up(
    sqrt_price_x96: u128,
    liquidity: u128,
    amount_in: u128,
) -> u128 {
    if amount_in == 0 {
        return sqrt_price_x96;
    }
    let numerator = U256::from(liquidity) << 96;
    let denominator = numerator + U256::from(amount_in) * U256::from(sqrt_price_x96);
    mul_div_ceil_u256(numerator, U256::from(sqrt_price_x96), denominator).to::<u128>()
}

// next = sqrtP + floor(amount * 2^96 / L)
// Rounded down so the pool never overcredits token1 input.
fn next_sqrt_price_from_amount1_rounding_down(
    sqrt_price_x96: u128,
    liquidity: u128,
    amount_in: u128,
) -> u128 {
    sqrt_price_x96
        .checked_add(mul_div(amount_in, Q96, liquidity))
        .expect("sqrt price overflow")
}
