//! Per-workflow capture session.
//!
//! `Empty -> Captured -> Parsed -> Submitted`. Changing the captured images
//! drops back out of `Parsed`; `Submitted` is terminal until `reset`.

use std::fmt;

use chrono::{DateTime, Utc};
use exitrack_core::{format_location, AggregateResult, CapturedImage, ExitrackError};
use exitrack_fusion::OperatorOverrides;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Plate or every invoice image still missing.
    Empty,
    Captured,
    Parsed,
    Submitted,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Captured => write!(f, "captured"),
            Self::Parsed => write!(f, "parsed"),
            Self::Submitted => write!(f, "submitted"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    plate: Option<CapturedImage>,
    invoices: Vec<CapturedImage>,
    location: Option<String>,
    parsed: Option<AggregateResult>,
    overrides: OperatorOverrides,
    submitted: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            plate: None,
            invoices: Vec::new(),
            location: None,
            parsed: None,
            overrides: OperatorOverrides::default(),
            submitted: false,
        }
    }

    /// Submission id, fixed for the life of the session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        if self.submitted {
            SessionPhase::Submitted
        } else if self.parsed.is_some() {
            SessionPhase::Parsed
        } else if self.plate.is_some() && !self.invoices.is_empty() {
            SessionPhase::Captured
        } else {
            SessionPhase::Empty
        }
    }

    pub fn plate(&self) -> Option<&CapturedImage> {
        self.plate.as_ref()
    }

    pub fn invoices(&self) -> &[CapturedImage] {
        &self.invoices
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// The plate capture time, reported as the session's capture time.
    pub fn capture_time(&self) -> Option<DateTime<Utc>> {
        self.plate.as_ref().map(|p| p.captured_at)
    }

    pub fn result(&self) -> Option<&AggregateResult> {
        self.parsed.as_ref()
    }

    pub fn overrides(&self) -> &OperatorOverrides {
        &self.overrides
    }

    pub fn set_plate(&mut self, image: CapturedImage) -> Result<(), ExitrackError> {
        self.ensure_open("replace the plate image")?;
        self.plate = Some(image);
        self.invalidate();
        Ok(())
    }

    pub fn clear_plate(&mut self) -> Result<(), ExitrackError> {
        self.ensure_open("remove the plate image")?;
        self.plate = None;
        self.invalidate();
        Ok(())
    }

    /// Returns the new image's index.
    pub fn add_invoice(&mut self, image: CapturedImage) -> Result<usize, ExitrackError> {
        self.ensure_open("add an invoice image")?;
        self.invoices.push(image);
        self.invalidate();
        Ok(self.invoices.len() - 1)
    }

    pub fn remove_invoice(&mut self, index: usize) -> Result<CapturedImage, ExitrackError> {
        self.ensure_open("remove an invoice image")?;
        if index >= self.invoices.len() {
            return Err(ExitrackError::InvalidTransition(format!(
                "no invoice image at index {index} ({} captured)",
                self.invoices.len()
            )));
        }
        let removed = self.invoices.remove(index);
        self.invalidate();
        Ok(removed)
    }

    pub fn set_location(&mut self, latitude: f64, longitude: f64) {
        self.location = Some(format_location(latitude, longitude));
    }

    pub fn clear_location(&mut self) {
        self.location = None;
    }

    /// Start over with a fresh id and nothing captured.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn ensure_open(&self, action: &str) -> Result<(), ExitrackError> {
        if self.submitted {
            return Err(ExitrackError::InvalidTransition(format!(
                "cannot {action}: session {} is already submitted",
                self.id
            )));
        }
        Ok(())
    }

    /// Images for a parse, or the one user-blocking validation error.
    pub(crate) fn images_for_parse(&self) -> Result<(&CapturedImage, &[CapturedImage]), ExitrackError> {
        let missing = match (&self.plate, self.invoices.is_empty()) {
            (Some(plate), false) => return Ok((plate, self.invoices.as_slice())),
            (None, true) => "plate image and at least one invoice image",
            (None, false) => "plate image",
            (Some(_), true) => "at least one invoice image",
        };
        Err(ExitrackError::MissingImages(missing.to_string()))
    }

    pub(crate) fn overrides_mut(&mut self) -> &mut OperatorOverrides {
        &mut self.overrides
    }

    pub(crate) fn result_mut(&mut self) -> Option<&mut AggregateResult> {
        self.parsed.as_mut()
    }

    pub(crate) fn set_result(&mut self, result: AggregateResult) {
        self.parsed = Some(result);
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    fn invalidate(&mut self) {
        self.parsed = None;
    }
}
