use tracing::debug;

use crate::errors::AppError;
use crate::models::brick::{Brick, Direction};
use crate::models::config::validate_trend_length;
use crate::models::signal::{Signal, SignalAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionState {
    Flat,
    Long,
}

/// Consecutive same-direction bricks ending at the current one.
#[derive(Debug, Default)]
struct RunCounter {
    direction: Option<Direction>,
    length: usize,
}

impl RunCounter {
    fn push(&mut self, direction: Direction) -> usize {
        if self.direction == Some(direction) {
            self.length += 1;
        } else {
            self.direction = Some(direction);
            self.length = 1;
        }
        self.length
    }
}

/// Turn a brick sequence into one signal per brick.
///
/// Long-only: a run of `buy_trend_length` up bricks while flat opens a
/// position, a run of `sell_trend_length` down bricks while long closes it.
pub fn generate(
    bricks: &[Brick],
    buy_trend_length: usize,
    sell_trend_length: usize,
) -> Result<Vec<Signal>, AppError> {
    validate_trend_length("buy_trend_length", buy_trend_length)?;
    validate_trend_length("sell_trend_length", sell_trend_length)?;

    let mut state = PositionState::Flat;
    let mut counter = RunCounter::default();
    let mut signals = Vec::with_capacity(bricks.len());

    for brick in bricks {
        let run = counter.push(brick.direction);

        let action = match (state, brick.direction) {
            (PositionState::Flat, Direction::Up) if run >= buy_trend_length => {
                state = PositionState::Long;
                SignalAction::Buy
            }
            (PositionState::Long, Direction::Down) if run >= sell_trend_length => {
                state = PositionState::Flat;
                SignalAction::Sell
            }
            _ => SignalAction::Hold,
        };

        signals.push(Signal {
            brick_index: brick.sequence_index,
            action,
        });
    }

    debug!(
        "Generated {} signals ({} buys, {} sells)",
        signals.len(),
        signals.iter().filter(|s| s.action == SignalAction::Buy).count(),
        signals.iter().filter(|s| s.action == SignalAction::Sell).count()
    );

    Ok(signals)
}
