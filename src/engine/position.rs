use crate::models::brick::Brick;
use crate::models::trade::{OpenPosition, Trade};

/// Open an all-in long position at the brick close. Quantity is fractional.
pub fn open_position(cash: f64, brick: &Brick) -> OpenPosition {
    let entry_price = brick.close_price;
    OpenPosition {
        entry_brick_index: brick.sequence_index,
        entry_date: brick.date,
        entry_price,
        quantity: cash / entry_price,
    }
}

/// Close the whole position at the brick close.
pub fn close_position(pos: &OpenPosition, brick: &Brick) -> Trade {
    let exit_price = brick.close_price;
    let pnl = pos.unrealized_pnl(exit_price);
    let return_pct = (exit_price - pos.entry_price) / pos.entry_price * 100.0;

    Trade {
        entry_brick_index: pos.entry_brick_index,
        exit_brick_index: brick.sequence_index,
        entry_date: pos.entry_date,
        exit_date: brick.date,
        entry_price: pos.entry_price,
        exit_price,
        quantity: pos.quantity,
        pnl,
        return_pct,
        duration_bricks: brick.sequence_index.saturating_sub(pos.entry_brick_index),
    }
}

/// Equity with an optional open position marked at `price`.
pub fn mark_to_market(cash: f64, position: Option<&OpenPosition>, price: f64) -> f64 {
    match position {
        Some(pos) => cash + pos.market_value(price),
        None => cash,
    }
}
