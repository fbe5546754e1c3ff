//! Fusion engine: one plate recognition plus N invoice recognitions in,
//! one `AggregateResult` out.
//!
//! Invoice fusion is a union plus an arithmetic mean, so the result does not
//! depend on the order in which recognitions completed.

use exitrack_core::{
    push_unique, AggregateResult, InvoiceRecord, OcrSource, PlateRecord, RecognitionResult,
};
use exitrack_understanding::{plate_record, InvoiceExtractor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::overrides::OperatorOverrides;

/// Threshold used when nothing else is configured.
pub const DEFAULT_THRESHOLD: f32 = 0.85;

/// Multiplier applied when exactly one invoice number was extracted.
pub const DEFAULT_SINGLE_MATCH_BOOST: f32 = 1.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionConfig {
    /// Either confidence strictly below this asks for a fallback pass.
    pub threshold: f32,
    pub single_match_boost: f32,
    /// When false the automatic result is final and `needs_fallback` is
    /// always false.
    pub enable_fallback: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            single_match_boost: DEFAULT_SINGLE_MATCH_BOOST,
            enable_fallback: true,
        }
    }
}

/// Adjust an invoice image's confidence by how many numbers it yielded.
///
/// None: forced to 0. Exactly one: boosted, never below `raw`, capped at 1.
/// Several: left as is.
pub fn adjust_invoice_confidence(raw: f32, extracted: usize, boost: f32) -> f32 {
    match extracted {
        0 => 0.0,
        1 => (raw * boost.max(1.0)).min(1.0).max(raw),
        _ => raw,
    }
}

#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    config: FusionConfig,
    extractor: InvoiceExtractor,
}

impl FusionEngine {
    pub fn new(config: FusionConfig, extractor: InvoiceExtractor) -> Self {
        Self { config, extractor }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn plate_record(&self, result: &RecognitionResult) -> PlateRecord {
        plate_record(result)
    }

    /// Extract numbers from one invoice recognition and adjust its confidence.
    ///
    /// Numbers the recognizer already extracted are taken as given and keep
    /// the recognizer's confidence; only an empty list forces it to 0.
    pub fn invoice_record(&self, result: &RecognitionResult) -> InvoiceRecord {
        let (invoice_numbers, confidence) = match &result.extracted {
            Some(numbers) => {
                let numbers = self.extractor.accept(numbers);
                let confidence = if numbers.is_empty() { 0.0 } else { result.confidence };
                (numbers, confidence)
            }
            None => {
                let numbers = self.extractor.extract(&result.raw_text);
                let confidence = adjust_invoice_confidence(
                    result.confidence,
                    numbers.len(),
                    self.config.single_match_boost,
                );
                (numbers, confidence)
            }
        };
        debug!(
            extracted = invoice_numbers.len(),
            raw_confidence = result.confidence,
            confidence,
            "Invoice record built"
        );
        InvoiceRecord {
            invoice_numbers,
            confidence,
            raw_text: result.raw_text.clone(),
            processing_time_ms: result.processing_time_ms,
        }
    }

    /// Fuse raw recognitions into one result.
    pub fn fuse(&self, plate: &RecognitionResult, invoices: &[RecognitionResult]) -> AggregateResult {
        let plate = self.plate_record(plate);
        let invoices: Vec<InvoiceRecord> = invoices.iter().map(|r| self.invoice_record(r)).collect();
        self.fuse_records(&plate, &invoices)
    }

    /// Fuse already-built records. `source` and `processing_time_ms` are left
    /// at their defaults for the caller to fill in.
    pub fn fuse_records(&self, plate: &PlateRecord, invoices: &[InvoiceRecord]) -> AggregateResult {
        let mut invoice_numbers = Vec::new();
        for record in invoices {
            for number in &record.invoice_numbers {
                push_unique(&mut invoice_numbers, number.clone());
            }
        }

        let invoice_confidence = if invoices.is_empty() {
            0.0
        } else {
            invoices.iter().map(|r| r.confidence).sum::<f32>() / invoices.len() as f32
        };

        let result = AggregateResult {
            vehicle_number: plate.vehicle_number.clone(),
            vehicle_confidence: plate.confidence,
            invoice_numbers,
            invoice_confidence,
            needs_fallback: self.needs_fallback(plate.confidence, invoice_confidence),
            vehicle_edited: plate.edited,
            invoices_edited: false,
            source: OcrSource::default(),
            processing_time_ms: 0,
        };

        info!(
            vehicle = %result.vehicle_number,
            vehicle_confidence = result.vehicle_confidence,
            invoices = result.invoice_numbers.len(),
            invoice_confidence = result.invoice_confidence,
            needs_fallback = result.needs_fallback,
            "Fused recognition results"
        );
        result
    }

    pub fn needs_fallback(&self, vehicle_confidence: f32, invoice_confidence: f32) -> bool {
        self.config.enable_fallback
            && (vehicle_confidence < self.config.threshold
                || invoice_confidence < self.config.threshold)
    }

    /// Re-apply operator edits on top of a (possibly fresh) automatic result
    /// and recompute the fallback decision.
    pub fn apply_overrides(&self, result: &mut AggregateResult, overrides: &OperatorOverrides) {
        if overrides.is_empty() {
            return;
        }
        overrides.apply(result);
        result.needs_fallback = self.needs_fallback(result.vehicle_confidence, result.invoice_confidence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exitrack_core::HUMAN_OVERRIDE_CONFIDENCE;
    use proptest::prelude::*;

    const TEXTS: [&str; 6] = [
        "Invoice No: INV-DBBA/0325/3219",
        "INV-100/A and INV-200/B",
        "Bill No: 77881",
        "blurry nothing",
        "",
        "Ref No: ABC123 INV-100/A",
    ];

    fn engine() -> FusionEngine {
        FusionEngine::default()
    }

    #[test]
    fn zero_numbers_force_zero_confidence() {
        let record = engine().invoice_record(&RecognitionResult::new("nothing here", 0.99));
        assert!(record.invoice_numbers.is_empty());
        assert_eq!(record.confidence, 0.0);
    }

    #[test]
    fn single_number_is_boosted_and_capped() {
        let record = engine().invoice_record(&RecognitionResult::new("Bill No: 77881", 0.7));
        assert!((record.confidence - 0.77).abs() < 1e-5);

        let capped = engine().invoice_record(&RecognitionResult::new("Bill No: 77881", 0.95));
        assert_eq!(capped.confidence, 1.0);
    }

    #[test]
    fn several_numbers_keep_raw_confidence() {
        let record = engine().invoice_record(&RecognitionResult::new(TEXTS[1], 0.66));
        assert_eq!(record.invoice_numbers.len(), 2);
        assert_eq!(record.confidence, 0.66);
    }

    fn structured(numbers: &[&str], confidence: f32) -> RecognitionResult {
        RecognitionResult {
            extracted: Some(numbers.iter().map(|n| n.to_string()).collect()),
            ..RecognitionResult::new(numbers.join("\n"), confidence)
        }
    }

    #[test]
    fn structured_numbers_bypass_patterns_and_boost() {
        let engine = engine();

        let record = engine.invoice_record(&structured(&["SO#4471"], 0.9));
        assert_eq!(record.invoice_numbers, vec!["SO#4471"]);
        assert_eq!(record.confidence, 0.9);

        let record = engine.invoice_record(&structured(&["INV 2291"], 0.9));
        assert_eq!(record.invoice_numbers, vec!["INV 2291"]);
        assert_eq!(record.confidence, 0.9);

        let record = engine.invoice_record(&structured(&["12.345.678"], 0.9));
        assert_eq!(record.invoice_numbers, vec!["12.345.678"]);

        let record = engine.invoice_record(&structured(&["INV-1001"], 0.8));
        assert_eq!(record.confidence, 0.8);
    }

    #[test]
    fn structured_numbers_are_cleaned_and_empty_list_is_zero() {
        let engine = engine();
        let record = engine.invoice_record(&structured(&[" so#4471 ", "SO#4471", "ab", "inv-9"], 0.7));
        assert_eq!(record.invoice_numbers, vec!["SO#4471", "INV-9"]);
        assert_eq!(record.confidence, 0.7);

        let empty = engine.invoice_record(&structured(&[], 0.95));
        assert!(empty.invoice_numbers.is_empty());
        assert_eq!(empty.confidence, 0.0);
    }

    #[test]
    fn remote_threshold_is_met_by_unboosted_confidence() {
        let engine = FusionEngine::new(
            FusionConfig {
                threshold: 0.8,
                ..FusionConfig::default()
            },
            InvoiceExtractor::default(),
        );
        let result = engine.fuse(
            &RecognitionResult::new("DHAKA METRO-GA 11-1234", 0.8),
            &[structured(&["INV-1001"], 0.8)],
        );
        assert_eq!(result.invoice_confidence, 0.8);
        assert!(!result.needs_fallback);
    }

    #[test]
    fn vehicle_confidence_is_not_boosted() {
        let result = engine().fuse(
            &RecognitionResult::new("ঢাকা মেট্রো গ ১১-১২৩৪", 0.81),
            &[RecognitionResult::new(TEXTS[0], 0.9)],
        );
        assert_eq!(result.vehicle_number, "DHAKA METRO-GA 11-1234");
        assert_eq!(result.vehicle_confidence, 0.81);
        assert_eq!(result.invoice_numbers, vec!["INV-DBBA/0325/3219"]);
        assert!(result.needs_fallback);
    }

    #[test]
    fn union_is_first_seen_and_mean_is_arithmetic() {
        let result = engine().fuse(
            &RecognitionResult::new("DHAKA METRO GA 11 1234", 0.9),
            &[
                RecognitionResult::new(TEXTS[5], 0.6),
                RecognitionResult::new(TEXTS[1], 0.8),
                RecognitionResult::new(TEXTS[3], 0.9),
            ],
        );
        assert_eq!(result.invoice_numbers, vec!["INV-100/A", "ABC123", "INV-200/B"]);
        let expected = (0.6 + 0.8 + 0.0) / 3.0;
        assert!((result.invoice_confidence - expected).abs() < 1e-6);
    }

    #[test]
    fn no_invoice_images_means_zero_confidence() {
        let result = engine().fuse(&RecognitionResult::new("DHAKA METRO GA 11 1234", 0.95), &[]);
        assert_eq!(result.invoice_confidence, 0.0);
        assert!(result.needs_fallback);
    }

    #[test]
    fn fallback_only_when_strictly_below_threshold() {
        let engine = FusionEngine::new(
            FusionConfig {
                threshold: 0.8,
                ..FusionConfig::default()
            },
            InvoiceExtractor::default(),
        );
        assert!(!engine.needs_fallback(0.8, 0.8));
        assert!(engine.needs_fallback(0.79, 0.8));
        assert!(engine.needs_fallback(0.8, 0.79));
    }

    #[test]
    fn disabled_fallback_is_never_requested() {
        let engine = FusionEngine::new(
            FusionConfig {
                enable_fallback: false,
                ..FusionConfig::default()
            },
            InvoiceExtractor::default(),
        );
        assert!(!engine.needs_fallback(0.0, 0.0));
    }

    #[test]
    fn overrides_clear_fallback_when_both_fields_edited() {
        let engine = engine();
        let mut result = engine.fuse(&RecognitionResult::new("", 0.0), &[]);
        assert!(result.needs_fallback);

        let mut overrides = OperatorOverrides::default();
        overrides.set_vehicle("DHAKA METRO-GA 11-1234");
        overrides.set_invoices(["INV-1"]);
        engine.apply_overrides(&mut result, &overrides);

        assert_eq!(result.vehicle_confidence, HUMAN_OVERRIDE_CONFIDENCE);
        assert_eq!(result.invoice_confidence, HUMAN_OVERRIDE_CONFIDENCE);
        assert!(!result.needs_fallback);
    }

    fn invoice_inputs() -> impl Strategy<Value = (Vec<(usize, f32)>, Vec<(usize, f32)>)> {
        prop::collection::vec((0usize..TEXTS.len(), 0.0f32..=1.0), 0..7)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    }

    proptest! {
        #[test]
        fn fusion_is_order_independent((original, shuffled) in invoice_inputs()) {
            let to_results = |v: &[(usize, f32)]| -> Vec<RecognitionResult> {
                v.iter().map(|(i, c)| RecognitionResult::new(TEXTS[*i], *c)).collect()
            };
            let plate = RecognitionResult::new("DHAKA METRO GA 11 1234", 0.9);
            let a = engine().fuse(&plate, &to_results(&original));
            let b = engine().fuse(&plate, &to_results(&shuffled));

            let mut set_a = a.invoice_numbers.clone();
            let mut set_b = b.invoice_numbers.clone();
            set_a.sort();
            set_b.sort();
            prop_assert_eq!(set_a, set_b);
            prop_assert!((a.invoice_confidence - b.invoice_confidence).abs() < 1e-5);
        }

        #[test]
        fn single_match_never_lowers_confidence(raw in 0.0f32..=1.0, boost in 1.0f32..2.0) {
            let adjusted = adjust_invoice_confidence(raw, 1, boost);
            prop_assert!(adjusted >= raw);
            prop_assert!(adjusted <= 1.0);
        }
    }
}
