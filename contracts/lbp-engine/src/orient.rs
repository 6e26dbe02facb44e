//! Token-orientation adapter.
//!
//! Internally the engine always reasons as if it sells token0: the floor
//! decays downward and the position sits above the price. When the sale
//! token is token1 the host's coordinates are the mirror image. These
//! functions are the only places where the reflection happens; everything
//! else stays in canonical orientation.

use clmm_pool::math;

/// Host ticks of the engine's position for a canonical lower bound.
pub fn position_range(is_token0: bool, lower: i32, max_tick: i32) -> (i32, i32) {
    if is_token0 {
        (lower, max_tick)
    } else {
        (-max_tick, -lower)
    }
}

/// Whether the pool price still sits inside (or beyond) the shrinking
/// floor, i.e. the range cannot be reprovisioned without selling first.
pub fn crossed_floor(is_token0: bool, pool_tick: i32, target_floor: i32) -> bool {
    if is_token0 {
        pool_tick >= target_floor
    } else {
        pool_tick <= -target_floor
    }
}

/// Tick whose sqrt price bounds the forced sell: one step past the new
/// floor, so the widened range is clear once the swap completes. Clamped to
/// the pool's tick range; whether the clamped limit can still clear the
/// floor is [`floor_clearable`]'s question.
pub fn sell_limit_tick(is_token0: bool, target_floor: i32) -> i32 {
    let tick = if is_token0 {
        target_floor - 1
    } else {
        -target_floor + 1
    };
    tick.clamp(math::MIN_TICK, math::MAX_TICK)
}

/// Whether a sell limit strictly past the floor exists on the pool's grid.
/// A floor sitting on the pool's edge has none: the price cannot be pushed
/// out of the range, so the epoch's placement defers instead of selling.
pub fn floor_clearable(is_token0: bool, target_floor: i32) -> bool {
    if is_token0 {
        target_floor - 1 > math::MIN_TICK
    } else {
        -target_floor + 1 < math::MAX_TICK
    }
}
