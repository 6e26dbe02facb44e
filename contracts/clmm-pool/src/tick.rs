//! Per-tick liquidity bookkeeping.
//!
//! Net liquidity is added when the price crosses a tick left-to-right and
//! subtracted right-to-left; gross liquidity tracks how many position units
//! reference the tick so storage can be reclaimed when it drops to zero.
//! Initialized ticks are kept in an ordered list, which stands in for a
//! bitmap at this pool's scale.

use soroban_sdk::{contracttype, Env, Vec};

use crate::math::add_liquidity_delta;
use crate::DataKey;

#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TickInfo {
    pub liquidity_gross: u128,
    pub liquidity_net: i128,
}

pub fn read_tick(env: &Env, tick: i32) -> TickInfo {
    env.storage()
        .persistent()
        .get(&DataKey::Tick(tick))
        .unwrap_or_default()
}

pub fn is_initialized(env: &Env, tick: i32) -> bool {
    env.storage().persistent().has(&DataKey::Tick(tick))
}

fn read_list(env: &Env) -> Vec<i32> {
    env.storage()
        .persistent()
        .get(&DataKey::TickList)
        .unwrap_or(Vec::new(env))
}

fn write_list(env: &Env, list: &Vec<i32>) {
    env.storage().persistent().set(&DataKey::TickList, list);
}

/// Apply a position's liquidity delta to one of its boundary ticks.
pub fn update_tick(env: &Env, tick: i32, liquidity_delta: i128, upper: bool) {
    let mut info = read_tick(env, tick);
    let was_initialized = info.liquidity_gross > 0;

    info.liquidity_gross = add_liquidity_delta(info.liquidity_gross, liquidity_delta);
    info.liquidity_net = if upper {
        info.liquidity_net
            .checked_sub(liquidity_delta)
            .expect("net liquidity overflow")
    } else {
        info.liquidity_net
            .checked_add(liquidity_delta)
            .expect("net liquidity overflow")
    };

    if info.liquidity_gross == 0 {
        env.storage().persistent().remove(&DataKey::Tick(tick));
        if was_initialized {
            remove_from_list(env, tick);
        }
    } else {
        env.storage().persistent().set(&DataKey::Tick(tick), &info);
        if !was_initialized {
            insert_into_list(env, tick);
        }
    }
}

/// Net liquidity to apply when the price transitions through `tick`.
pub fn cross_tick(env: &Env, tick: i32) -> i128 {
    read_tick(env, tick).liquidity_net
}

/// Next initialized tick in the swap direction: at or below `from` when the
/// price is falling, strictly above it when rising.
pub fn next_initialized_tick(env: &Env, from: i32, zero_for_one: bool) -> Option<i32> {
    let list = read_list(env);
    if zero_for_one {
        let mut found = None;
        for tick in list.iter() {
            if tick <= from {
                found = Some(tick);
            } else {
                break;
            }
        }
        found
    } else {
        for tick in list.iter() {
            if tick > from {
                return Some(tick);
            }
        }
        None
    }
}

fn insert_into_list(env: &Env, tick: i32) {
    let mut list = read_list(env);
    let mut index = 0u32;
    for existing in list.iter() {
        if existing >= tick {
            break;
        }
        index += 1;
    }
    list.insert(index, tick);
    write_list(env, &list);
}

fn remove_from_list(env: &Env, tick: i32) {
    let mut list = read_list(env);
    if let Some(index) = list.first_index_of(tick) {
        list.remove(index);
        write_list(env, &list);
    }
}
