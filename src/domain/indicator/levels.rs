//! Support and resistance levels.
//!
//! Two detectors are provided:
//!
//! - **Fractals**: a bar is a fractal high when its high is strictly above the
//!   highs of the two bars before and the two bars after it (mirror for lows).
//!   Fractal prices are then aggregated: sorted ascending, grouped while each
//!   next price lies within `tolerance` of the group's last member, and every
//!   group is replaced by its median. A fractal at index `i` only exists once
//!   bars `i+1` and `i+2` are present.
//! - **Touch count**: for bar `i`, the `window` bars before it give a candidate
//!   resistance `max(high)` and support `min(low)`. The candidate is confirmed
//!   for bar `i` when at least `touch_threshold` bars in that window have a
//!   high (low) within ±0.1% of it.
//!
//! A third stream, [`session_range`], gives the high and low of the recent
//! bars that fell inside an hour window.
//!
//! Every detector returns a separate level stream; bars are never annotated.

use crate::domain::bar::Bar;
use crate::domain::session::HourWindow;

/// Relative distance within which a bar counts as touching a level.
pub const TOUCH_BAND: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub price: f64,
    pub touch_count: usize,
    pub last_seen_index: usize,
}

impl Level {
    pub fn is_confirmed(&self, touch_threshold: usize) -> bool {
        self.touch_count >= touch_threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FractalKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fractal {
    pub index: usize,
    pub price: f64,
    pub kind: FractalKind,
}

/// All fractal highs and lows that are final for the given bars.
pub fn find_fractals(bars: &[Bar]) -> Vec<Fractal> {
    let mut fractals = Vec::new();
    if bars.len() < 5 {
        return fractals;
    }
    for i in 2..bars.len() - 2 {
        let neighbours = [i - 2, i - 1, i + 1, i + 2];
        if neighbours.iter().all(|&j| bars[i].high > bars[j].high) {
            fractals.push(Fractal {
                index: i,
                price: bars[i].high,
                kind: FractalKind::High,
            });
        }
        if neighbours.iter().all(|&j| bars[i].low < bars[j].low) {
            fractals.push(Fractal {
                index: i,
                price: bars[i].low,
                kind: FractalKind::Low,
            });
        }
    }
    fractals
}

/// Merge `(price, bar index)` points into levels, ascending by price.
///
/// Each level's `touch_count` is its group size and `last_seen_index` the
/// latest bar index in the group.
pub fn aggregate_points(points: &[(f64, usize)], tolerance: f64) -> Vec<Level> {
    let mut sorted: Vec<(f64, usize)> = points.iter().copied().filter(|(p, _)| p.is_finite()).collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut levels = Vec::new();
    let mut group: Vec<(f64, usize)> = Vec::new();
    for point in sorted {
        if let Some(last) = group.last() {
            if (point.0 - last.0).abs() > tolerance {
                levels.push(close_group(&group));
                group.clear();
            }
        }
        group.push(point);
    }
    if !group.is_empty() {
        levels.push(close_group(&group));
    }
    levels
}

fn close_group(group: &[(f64, usize)]) -> Level {
    let n = group.len();
    let price = if n % 2 == 1 {
        group[n / 2].0
    } else {
        (group[n / 2 - 1].0 + group[n / 2].0) / 2.0
    };
    Level {
        price,
        touch_count: n,
        last_seen_index: group.iter().map(|(_, i)| *i).max().unwrap_or(0),
    }
}

/// Aggregated fractal levels over a bar slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FractalLevels {
    pub resistances: Vec<Level>,
    pub supports: Vec<Level>,
}

impl FractalLevels {
    pub fn from_bars(bars: &[Bar], tolerance: f64) -> Self {
        Self::from_fractals(&find_fractals(bars), tolerance)
    }

    pub fn from_fractals<'f>(fractals: impl IntoIterator<Item = &'f Fractal>, tolerance: f64) -> Self {
        let mut highs = Vec::new();
        let mut lows = Vec::new();
        for f in fractals {
            match f.kind {
                FractalKind::High => highs.push((f.price, f.index)),
                FractalKind::Low => lows.push((f.price, f.index)),
            }
        }
        Self {
            resistances: aggregate_points(&highs, tolerance),
            supports: aggregate_points(&lows, tolerance),
        }
    }

    /// Most recently emitted confirmed resistance.
    pub fn active_resistance(&self, touch_threshold: usize) -> Option<Level> {
        self.resistances
            .iter()
            .rev()
            .find(|l| l.is_confirmed(touch_threshold))
            .copied()
    }

    /// Most recently emitted confirmed support.
    pub fn active_support(&self, touch_threshold: usize) -> Option<Level> {
        self.supports
            .iter()
            .rev()
            .find(|l| l.is_confirmed(touch_threshold))
            .copied()
    }
}

/// Per-bar confirmed touch-count levels. Both vectors have one entry per bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchLevels {
    pub resistance: Vec<Option<Level>>,
    pub support: Vec<Option<Level>>,
}

pub fn touch_levels(bars: &[Bar], window: usize, touch_threshold: usize) -> TouchLevels {
    let mut levels = TouchLevels {
        resistance: vec![None; bars.len()],
        support: vec![None; bars.len()],
    };
    if window == 0 {
        return levels;
    }

    for i in window..bars.len() {
        let start = i - window;
        let lookback = &bars[start..i];

        let highest = lookback.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let lowest = lookback.iter().map(|b| b.low).fold(f64::MAX, f64::min);

        levels.resistance[i] = touching(lookback, start, highest, |b| b.high)
            .filter(|l| l.is_confirmed(touch_threshold));
        levels.support[i] = touching(lookback, start, lowest, |b| b.low)
            .filter(|l| l.is_confirmed(touch_threshold));
    }
    levels
}

fn touching(lookback: &[Bar], start: usize, candidate: f64, price: impl Fn(&Bar) -> f64) -> Option<Level> {
    let lower = candidate * (1.0 - TOUCH_BAND);
    let upper = candidate * (1.0 + TOUCH_BAND);
    let mut touch_count = 0;
    let mut last_seen_index = None;
    for (offset, bar) in lookback.iter().enumerate() {
        let p = price(bar);
        if p >= lower && p <= upper {
            touch_count += 1;
            last_seen_index = Some(start + offset);
        }
    }
    last_seen_index.map(|last_seen_index| Level {
        price: candidate,
        touch_count,
        last_seen_index,
    })
}

/// Per-bar high and low of the in-window bars among the `lookback` bars
/// before it. `None` when none of them fell inside `hours`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRange {
    pub high: Vec<Option<f64>>,
    pub low: Vec<Option<f64>>,
}

pub fn session_range(bars: &[Bar], hours: HourWindow, lookback: usize) -> SessionRange {
    let mut range = SessionRange {
        high: vec![None; bars.len()],
        low: vec![None; bars.len()],
    };
    for i in 1..bars.len() {
        let inside = bars[i.saturating_sub(lookback)..i]
            .iter()
            .filter(|b| hours.contains_time(b.timestamp));
        let (high, low) = inside.fold((None::<f64>, None::<f64>), |(h, l), b| {
            (
                Some(h.map_or(b.high, |h| h.max(b.high))),
                Some(l.map_or(b.low, |l| l.min(b.low))),
            )
        });
        range.high[i] = high;
        range.low[i] = low;
    }
    range
}

/// One-line `S----C------R` picture of where price sits between the levels.
///
/// A missing level is drawn `width` price units away from the current price
/// on its side.
pub fn render_level_scale(current: f64, support: Option<f64>, resistance: Option<f64>, width: usize) -> String {
    let width = width.max(2);
    let span = width as f64;
    let support = support.unwrap_or(current - span);
    let resistance = resistance.unwrap_or(current + span);
    let mut range = resistance - support;
    if range <= 0.0 {
        range = 1.0;
    }

    let pos = (((current - support) / range) * span).floor();
    let pos = if pos.is_finite() { pos.clamp(0.0, span) as usize } else { 0 };

    let mut scale = vec!['-'; width + 1];
    scale[0] = 'S';
    scale[width] = 'R';
    scale[pos] = 'C';
    scale.into_iter().collect()
}
