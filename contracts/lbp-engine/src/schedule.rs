//! Linear release schedule, evaluated on the epoch grid.
//!
//! Both evaluators are pure functions of an epoch-floored timestamp. Callers
//! guarantee `t >= start_time`; querying earlier is a programming error and
//! panics. At or past `end_time` both evaluators clamp, so late epochs are
//! stable no matter how long after the window they run.

use clmm_pool::math;

use crate::LiquidityInfo;

/// Floor a timestamp to its epoch boundary.
pub fn floor_to_epoch(epoch_size: u64, t: u64) -> u64 {
    assert!(epoch_size > 0, "epoch size zero");
    (t / epoch_size) * epoch_size
}

/// Cumulative sale amount scheduled for commitment by time `t`.
pub fn target_amount(info: &LiquidityInfo, t: u64) -> i128 {
    assert!(t >= info.start_time, "schedule queried before start");
    if t >= info.end_time {
        return info.total_amount;
    }
    let elapsed = (t - info.start_time) as u128;
    let duration = (info.end_time - info.start_time) as u128;
    // elapsed * total_amount exceeds 128 bits for large sales; mul_div
    // widens the product before dividing
    math::mul_div(elapsed, info.total_amount as u128, duration) as i128
}

/// Lower bound of the placement range at time `t`.
///
/// Expressed as `max_tick - elapsed-share-of-range` so the endpoints are
/// exact: `max_tick` at start, `min_tick` at end.
pub fn target_min_tick(info: &LiquidityInfo, t: u64) -> i32 {
    assert!(t >= info.start_time, "schedule queried before start");
    if t >= info.end_time {
        return info.min_tick;
    }
    let elapsed = (t - info.start_time) as i128;
    let range = (info.max_tick - info.min_tick) as i128;
    let duration = (info.end_time - info.start_time) as i128;
    let delta = elapsed * range / duration;
    info.max_tick - delta as i32
}
