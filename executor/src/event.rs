use common::{Candle, Tick};

/// One incoming event the executor dispatches to impacted nodes.
#[derive(Debug, Clone)]
pub enum Event {
    Tick(Tick),
    Candle(Candle),
}

impl Event {
    /// The timeframe tag an `INDICATOR`/`CANDLE` input would need to match,
    /// `None` for a tick event.
    #[must_use]
    pub fn timeframe_tag(&self) -> Option<&'static str> {
        match self {
            Event::Tick(_) => None,
            Event::Candle(c) => Some(c.timeframe.as_str()),
        }
    }
}
