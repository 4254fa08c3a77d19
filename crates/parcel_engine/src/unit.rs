use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// Tax figures attached to a parcel. Present for every unit of a run or for none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxRecord {
    /// Billed tax, same currency as `market_value`.
    pub amount: f64,
}

/// Derived figures. Only [`crate::metrics::recompute_metrics`] writes these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitMetrics {
    /// Planar area in squared coordinate units.
    pub area: f64,
    pub value_per_area: f64,
    pub acres: f64,
    pub value_per_acre: f64,
    pub tax_per_area: Option<f64>,
    /// `tax / market_value`; absent for zero-valued (exempt) land.
    pub effective_tax_rate: Option<f64>,
}

/// One land record as it moves through the consolidation stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelUnit {
    pub identifier: String,
    pub geometry: MultiPolygon<f64>,
    pub assessed_value: f64,
    pub market_value: f64,
    pub classification: Option<String>,
    pub address: Option<String>,
    pub secondary_identifier: Option<String>,
    pub tax: Option<TaxRecord>,
    pub metrics: Option<UnitMetrics>,
}

impl ParcelUnit {
    /// A fresh record whose market value equals its assessed value until priced.
    pub fn new(
        identifier: impl Into<String>,
        geometry: impl Into<MultiPolygon<f64>>,
        assessed_value: f64,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            geometry: geometry.into(),
            assessed_value,
            market_value: assessed_value,
            classification: None,
            address: None,
            secondary_identifier: None,
            tax: None,
            metrics: None,
        }
    }

    pub fn with_market_value(mut self, market_value: f64) -> Self {
        self.market_value = market_value;
        self
    }

    pub fn with_classification(mut self, class: impl Into<String>) -> Self {
        self.classification = Some(class.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_secondary_identifier(mut self, id: impl Into<String>) -> Self {
        self.secondary_identifier = Some(id.into());
        self
    }

    pub fn with_tax(mut self, amount: f64) -> Self {
        self.tax = Some(TaxRecord { amount });
        self
    }

    /// Fold the monetary figures of `other` into `self`.
    ///
    /// Passthrough attributes stay with `self` (the earlier record in input
    /// order). Geometry is left untouched; callers replace it with the union
    /// of the group. Metrics are invalidated.
    pub fn absorb_values(&mut self, other: &ParcelUnit) {
        self.assessed_value += other.assessed_value;
        self.market_value += other.market_value;
        self.tax = match (self.tax, other.tax) {
            (Some(a), Some(b)) => Some(TaxRecord {
                amount: a.amount + b.amount,
            }),
            (a, b) => a.or(b),
        };
        self.metrics = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x: f64) -> geo::Polygon<f64> {
        polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0)]
    }

    #[test]
    fn absorb_sums_money_and_keeps_first_attributes() {
        let mut first = ParcelUnit::new("1", square(0.0), 100.0)
            .with_market_value(1000.0)
            .with_classification("2-11")
            .with_tax(20.0);
        let second = ParcelUnit::new("2", square(5.0), 50.0)
            .with_market_value(200.0)
            .with_classification("5-17")
            .with_address("1 Main St")
            .with_tax(5.0);

        first.absorb_values(&second);

        assert_eq!(first.identifier, "1");
        assert_eq!(first.assessed_value, 150.0);
        assert_eq!(first.market_value, 1200.0);
        assert_eq!(first.classification.as_deref(), Some("2-11"));
        assert_eq!(first.address, None);
        assert_eq!(first.tax, Some(TaxRecord { amount: 25.0 }));
    }

    #[test]
    fn absorb_clears_metrics() {
        let mut unit = ParcelUnit::new("1", square(0.0), 1.0);
        unit.metrics = Some(UnitMetrics {
            area: 1.0,
            value_per_area: 1.0,
            acres: 0.0,
            value_per_acre: 0.0,
            tax_per_area: None,
            effective_tax_rate: None,
        });
        unit.absorb_values(&ParcelUnit::new("1", square(3.0), 1.0));
        assert!(unit.metrics.is_none());
    }
}
