//! End-of-run summary of the consolidated dataset.

use log::{info, warn};
use parcel_engine::{Consolidation, EngineError, ParcelUnit};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub mean: f64,
}

impl Spread {
    fn of(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let n = values.len();
        let median = if n % 2 == 1 {
            values[n / 2]
        } else {
            0.5 * (values[n / 2 - 1] + values[n / 2])
        };

        Some(Self {
            min: values[0],
            max: values[n - 1],
            median,
            mean: values.iter().sum::<f64>() / n as f64,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub units: usize,
    pub total_market_value: f64,
    pub value_per_acre: Option<Spread>,
    /// `(class, count)`, most common first, ties by class code.
    pub classes: Vec<(String, usize)>,
    /// `(pin, value_per_acre, market_value, acres, class)`, highest first.
    pub top: Vec<(String, f64, f64, f64, String)>,
    pub zero_area: usize,
    pub excluded: usize,
}

impl Summary {
    pub fn new(result: &Consolidation, top_n: usize) -> Self {
        let units = &result.units;

        let per_acre: Vec<f64> = units
            .iter()
            .filter_map(|u| u.metrics.map(|m| m.value_per_acre))
            .collect();

        let mut class_counts: HashMap<&str, usize> = HashMap::new();
        for unit in units {
            *class_counts
                .entry(unit.classification.as_deref().unwrap_or("?"))
                .or_default() += 1;
        }
        let mut classes: Vec<(String, usize)> = class_counts
            .into_iter()
            .map(|(c, n)| (c.to_owned(), n))
            .collect();
        classes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        classes.truncate(top_n);

        let mut ranked: Vec<&ParcelUnit> = units.iter().filter(|u| u.metrics.is_some()).collect();
        ranked.sort_by(|a, b| {
            let va = a.metrics.map_or(0.0, |m| m.value_per_acre);
            let vb = b.metrics.map_or(0.0, |m| m.value_per_acre);
            vb.total_cmp(&va).then_with(|| a.identifier.cmp(&b.identifier))
        });
        let top = ranked
            .into_iter()
            .take(top_n)
            .filter_map(|u| {
                let m = u.metrics?;
                Some((
                    u.identifier.clone(),
                    m.value_per_acre,
                    u.market_value,
                    m.acres,
                    u.classification.clone().unwrap_or_default(),
                ))
            })
            .collect();

        let zero_area = result
            .diagnostics
            .iter()
            .filter(|d| matches!(d, EngineError::ZeroAreaResult { .. }))
            .count();
        let excluded = result
            .diagnostics
            .iter()
            .filter(|d| matches!(d, EngineError::InvalidGeometry { .. }))
            .count();

        Self {
            units: units.len(),
            total_market_value: units.iter().map(|u| u.market_value).sum(),
            value_per_acre: Spread::of(per_acre),
            classes,
            top,
            zero_area,
            excluded,
        }
    }

    pub fn log(&self) {
        info!("{}", "-".repeat(70));
        info!("SUMMARY");
        info!("{}", "-".repeat(70));
        info!("Land units: {}", self.units);
        info!("Total market value: ${:.0}", self.total_market_value);

        if let Some(s) = self.value_per_acre {
            info!("Value per acre:");
            info!("  Min:    ${:.0}", s.min);
            info!("  Max:    ${:.0}", s.max);
            info!("  Median: ${:.0}", s.median);
            info!("  Mean:   ${:.0}", s.mean);
        }

        info!("Class distribution (top {}):", self.classes.len());
        for (class, n) in &self.classes {
            info!("  {:<8} {:>9}", class, n);
        }

        info!("Highest value per acre:");
        for (pin, vpa, mv, acres, class) in &self.top {
            info!(
                "  {:<14} ${:>14.0}/ac  ${:>14.0}  {:>10.4} ac  {}",
                pin, vpa, mv, acres, class
            );
        }

        if self.zero_area > 0 {
            warn!("{} units have zero area and no metrics", self.zero_area);
        }
        if self.excluded > 0 {
            warn!("{} parcels excluded for invalid geometry", self.excluded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use parcel_engine::{consolidate, CancelToken, EngineConfig};

    fn lot(pin: &str, side: f64, value: f64, class: &str) -> ParcelUnit {
        ParcelUnit::new(
            pin,
            polygon![(x: 0.0, y: 0.0), (x: side, y: 0.0), (x: side, y: side), (x: 0.0, y: side)],
            value,
        )
        .with_classification(class)
    }

    #[test]
    fn spread_of_even_and_odd() {
        let s = Spread::of(vec![4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!((s.min, s.max, s.median, s.mean), (1.0, 4.0, 2.5, 2.5));
        assert_eq!(Spread::of(vec![5.0, 1.0, 3.0]).unwrap().median, 3.0);
        assert!(Spread::of(Vec::new()).is_none());
    }

    #[test]
    fn summary_ranks_and_counts() {
        // Lots are far apart so nothing merges.
        let mut units = vec![lot("a", 10.0, 100.0, "2"), lot("b", 10.0, 900.0, "5"), lot("c", 10.0, 50.0, "2")];
        for (i, u) in units.iter_mut().enumerate() {
            let dx = i as f64 * 100.0;
            u.geometry.0[0].exterior_mut(|ring| {
                ring.0.iter_mut().for_each(|c| c.x += dx);
            });
        }

        let result = consolidate(units, &EngineConfig::default(), &CancelToken::new()).unwrap();
        let summary = Summary::new(&result, 2);

        assert_eq!(summary.units, 3);
        assert_eq!(summary.total_market_value, 1050.0);
        assert_eq!(summary.classes, vec![("2".to_string(), 2), ("5".to_string(), 1)]);
        assert_eq!(summary.top.len(), 2);
        assert_eq!(summary.top[0].0, "b");
        assert_eq!(summary.top[1].0, "a");
        assert_eq!(summary.zero_area, 0);
    }
}
