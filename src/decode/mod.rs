//! Decoding of JSON-stat-like responses into the observation table.

pub mod codec;
pub mod normalize;
pub mod payload;

use serde::Serialize;

pub use codec::{strides, unravel, Axis, AxisRoles, DimensionRole, IndexCodec};
pub use normalize::{normalize_response, parse_year, DecodeReport, Layout, SkipReason};
pub use payload::{StatPayload, ValueContainer};

use crate::{indicator::Indicator, table::ObservationTable};

/// Totals over every response decoded for one indicator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndicatorDecodeSummary {
    pub responses: usize,
    pub skipped: usize,
    pub accepted: usize,
    pub dropped: usize,
}

impl IndicatorDecodeSummary {
    pub fn add(&mut self, report: &DecodeReport) {
        self.responses += 1;
        if report.skipped.is_some() {
            self.skipped += 1;
        }
        self.accepted += report.accepted;
        self.dropped += report.dropped();
    }
}

/// Decode every payload fetched for `indicator` (one per batch) into `table`.
pub fn normalize_all<'a, I>(
    payloads: I,
    indicator: Indicator,
    table: &mut ObservationTable,
) -> IndicatorDecodeSummary
where
    I: IntoIterator<Item = &'a StatPayload>,
{
    let mut summary = IndicatorDecodeSummary::default();
    for payload in payloads {
        summary.add(&normalize_response(payload, indicator, table));
    }
    summary
}
