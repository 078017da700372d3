//! Rolling-window candle-pattern classifier: the reference node illustrating
//! the node contract (see `SPEC_FULL.md` §4.6).

use std::any::Any;
use std::collections::VecDeque;

use common::Candle;
use serde_json::json;

use crate::node::{Node, NodeInputs, NodeOutputs};

struct State {
    buffer: VecDeque<Candle>,
    buffer_filled: bool,
}

/// Maintains the last `buffer_size` candles of one timeframe and, once full,
/// emits a deterministic map of direction/position classifications.
pub struct PatternClassifierNode {
    pub buffer_size: usize,
}

impl PatternClassifierNode {
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }
}

impl Node for PatternClassifierNode {
    fn init_state(&self) -> Box<dyn Any + Send> {
        Box::new(State {
            buffer: VecDeque::with_capacity(self.buffer_size),
            buffer_filled: false,
        })
    }

    fn compute(&self, inputs: &NodeInputs, state: &mut dyn Any) -> NodeOutputs {
        let state = state
            .downcast_mut::<State>()
            .expect("PatternClassifierNode state type mismatch");

        let Some(candle_value) = inputs.iter().find_map(|(key, value)| {
            key.starts_with("candle_").then_some(value)
        }) else {
            tracing::warn!("pattern classifier: no candle input found");
            return NodeOutputs::default();
        };

        let candle: Candle = match serde_json::from_value(candle_value.clone()) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "pattern classifier: failed to parse candle");
                return NodeOutputs::default();
            }
        };

        if state.buffer.len() == self.buffer_size {
            state.buffer.pop_front();
        }
        state.buffer.push_back(candle.clone());

        if state.buffer.len() == self.buffer_size {
            state.buffer_filled = true;
        }
        if !state.buffer_filled {
            return NodeOutputs::default();
        }

        let candles: Vec<Candle> = state.buffer.iter().cloned().collect();
        let filters = build_all_filters(&candles);

        let mut out = NodeOutputs::default();
        out.insert("symbol".to_string(), json!(candle.symbol));
        out.insert("timestamp".to_string(), json!(candle.timestamp));
        out.insert("timeframe".to_string(), json!(candle.timeframe.as_str()));
        out.insert("filters".to_string(), json!(filters));
        out
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Bullish => "Bullish",
            Direction::Bearish => "Bearish",
        }
    }
}

fn analyze_direction(candle: &Candle) -> Direction {
    if candle.close >= candle.open {
        Direction::Bullish
    } else {
        Direction::Bearish
    }
}

fn build_direction_filters(candles: &[Candle]) -> Vec<(String, &'static str)> {
    candles
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let n = idx + 1;
            (format!("C{n}_body_direction"), analyze_direction(c).as_str())
        })
        .collect()
}

/// Ported bit-for-bit from the reference classifier's branch table: for each
/// consecutive candle pair, places the current candle's high/low/close
/// relative to the body/extremes of the previous candle.
fn build_position_filters(candles: &[Candle]) -> Vec<(String, &'static str)> {
    if candles.len() < 2 {
        return Vec::new();
    }

    let mut filters: Vec<(String, &'static str)> = Vec::new();
    for idx in 0..candles.len() - 1 {
        let c1 = &candles[idx];
        let c2 = &candles[idx + 1];
        let n = idx + 2;

        let c1_dir = analyze_direction(c1);
        let c2_dir = analyze_direction(c2);
        let (c1_body_top, c1_body_bottom) = match c1_dir {
            Direction::Bullish => (c1.close, c1.open),
            Direction::Bearish => (c1.open, c1.close),
        };

        let mut set = |key: String, value: &'static str| filters.push((key, value));

        match (c1_dir, c2_dir) {
            (Direction::Bullish, Direction::Bullish) => {
                if c2.close > c1.high {
                    set(format!("C{n}_close_diff_prev_high"), "Above");
                } else if c2.high < c1.high {
                    set(format!("C{n}_high_diff_prev_high"), "Below");
                } else if c2.high > c1.high {
                    set(format!("C{n}_high_diff_prev_high"), "Above");
                    set(format!("C{n}_close_diff_prev_high"), "Below");
                }

                if c2.low < c1.low {
                    set(format!("C{n}_low_diff_prev_low"), "Below");
                } else if c2.low > c1_body_bottom {
                    set(format!("C{n}_low_diff_prev_open"), "Above");
                } else if c2.low > c1.low && c2.low < c1_body_bottom {
                    set(format!("C{n}_low_diff_prev_open"), "Below");
                    set(format!("C{n}_low_diff_prev_low"), "Above");
                }
            }
            (Direction::Bullish, Direction::Bearish) => {
                if c2.close < c1.low {
                    set(format!("C{n}_close_diff_prev_low"), "Below");
                } else if c2.low > c1_body_bottom {
                    set(format!("C{n}_low_diff_prev_open"), "Above");
                } else if c2.low > c1.low && c2.low < c1_body_bottom {
                    set(format!("C{n}_low_diff_prev_low"), "Above");
                    set(format!("C{n}_low_diff_prev_open"), "Below");

                    if c2.close < c1_body_bottom {
                        set(format!("C{n}_close_diff_prev_open"), "Below");
                    } else {
                        set(format!("C{n}_close_diff_prev_open"), "Above");
                    }
                }

                if c2.high > c1.high {
                    set(format!("C{n}_high_diff_prev_high"), "Above");
                } else {
                    set(format!("C{n}_high_diff_prev_high"), "Below");
                }
            }
            (Direction::Bearish, Direction::Bearish) => {
                if c2.close < c1.low {
                    set(format!("C{n}_close_diff_prev_low"), "Below");
                } else if c2.low > c1.low {
                    set(format!("C{n}_low_diff_prev_low"), "Above");
                } else if c2.low < c1.low {
                    set(format!("C{n}_low_diff_prev_low"), "Below");
                    set(format!("C{n}_close_diff_prev_low"), "Above");
                }

                if c2.high > c1.high {
                    set(format!("C{n}_high_diff_prev_high"), "Above");
                } else if c2.high < c1_body_top {
                    set(format!("C{n}_high_diff_prev_open"), "Below");
                } else if c2.high < c1.high && c2.high > c1_body_top {
                    set(format!("C{n}_high_diff_prev_open"), "Above");
                    set(format!("C{n}_high_diff_prev_high"), "Below");
                }
            }
            (Direction::Bearish, Direction::Bullish) => {
                if c2.close > c1.high {
                    set(format!("C{n}_close_diff_prev_high"), "Above");
                } else if c2.high < c1_body_top {
                    set(format!("C{n}_high_diff_prev_open"), "Below");
                } else if c2.high < c1.high && c2.high > c1_body_top {
                    set(format!("C{n}_high_diff_prev_high"), "Below");
                    set(format!("C{n}_high_diff_prev_open"), "Above");

                    if c2.close > c1_body_top {
                        set(format!("C{n}_close_diff_prev_open"), "Above");
                    } else {
                        set(format!("C{n}_close_diff_prev_open"), "Below");
                    }
                }

                if c2.low < c1.low {
                    set(format!("C{n}_low_diff_prev_low"), "Below");
                } else {
                    set(format!("C{n}_low_diff_prev_low"), "Above");
                }
            }
        }
    }
    filters
}

fn build_all_filters(candles: &[Candle]) -> std::collections::BTreeMap<String, &'static str> {
    let mut out = std::collections::BTreeMap::new();
    for (k, v) in build_direction_filters(candles) {
        out.insert(k, v);
    }
    for (k, v) in build_position_filters(candles) {
        out.insert(k, v);
    }
    out
}
