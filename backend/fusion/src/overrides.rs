//! Operator corrections that must survive a re-parse of the same session.

use exitrack_core::AggregateResult;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorOverrides {
    vehicle: Option<String>,
    invoices: Option<Vec<String>>,
}

impl OperatorOverrides {
    pub fn set_vehicle(&mut self, value: &str) {
        self.vehicle = Some(value.trim().to_string());
    }

    pub fn set_invoices<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.invoices = Some(values.into_iter().map(|v| v.as_ref().to_string()).collect());
    }

    /// Comma-separated operator input: `"INV-1, INV-2,,"`.
    pub fn set_invoices_from_csv(&mut self, input: &str) {
        self.set_invoices(input.split(','));
    }

    pub fn vehicle(&self) -> Option<&str> {
        self.vehicle.as_deref()
    }

    pub fn invoices(&self) -> Option<&[String]> {
        self.invoices.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicle.is_none() && self.invoices.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Write the stored edits into `result`. Untouched fields keep their
    /// automatic values.
    pub fn apply(&self, result: &mut AggregateResult) {
        if let Some(vehicle) = &self.vehicle {
            result.override_vehicle(vehicle);
        }
        if let Some(invoices) = &self.invoices {
            result.override_invoices(invoices);
        }
    }
}
