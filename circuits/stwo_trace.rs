//! Export of finalized Merkle rows as STWO trace columns
//!
//! The main trace is row-major; STWO commits to column-major evaluations
//! over a canonic coset. This packs the Merkle column group into
//! `CircleEvaluation`s, zero-padding up to `2^log_n_rows` rows.

use itertools::Itertools;
use stwo::core::fields::m31::BaseField;
use stwo::core::poly::circle::CanonicCoset;
use stwo::core::ColumnVec;
use stwo::prover::backend::simd::SimdBackend;
use stwo::prover::backend::{Col, Column};
use stwo::prover::poly::circle::CircleEvaluation;
use stwo::prover::poly::BitReversedOrder;

use crate::m31::M31;
use crate::trace::{MainTraceRow, N_MERKLE_COLUMNS};
use crate::{Result, TraceError};

/// Convert our M31 to STWO's BaseField
#[inline]
pub fn m31_to_base(m: M31) -> BaseField {
    BaseField::from_u32_unchecked(m.value())
}

/// Pack the Merkle columns of `rows` into STWO evaluations of size `2^log_n_rows`
pub fn merkle_columns_to_stwo(
    rows: &[MainTraceRow],
    log_n_rows: u32,
) -> Result<ColumnVec<CircleEvaluation<SimdBackend, BaseField, BitReversedOrder>>> {
    let n_rows = 1usize << log_n_rows;
    if rows.len() > n_rows {
        return Err(TraceError::ExportTooLarge {
            rows: rows.len(),
            log_n_rows,
        });
    }

    let mut trace: Vec<Col<SimdBackend, BaseField>> = (0..N_MERKLE_COLUMNS)
        .map(|_| Col::<SimdBackend, BaseField>::zeros(n_rows))
        .collect_vec();

    for (row_index, row) in rows.iter().enumerate() {
        for (col, value) in trace.iter_mut().zip(row.merkle_columns()) {
            col.set(row_index, m31_to_base(value));
        }
    }

    tracing::debug!(rows = rows.len(), log_n_rows, "merkle columns exported");

    let domain = CanonicCoset::new(log_n_rows).circle_domain();
    Ok(trace
        .into_iter()
        .map(|col| CircleEvaluation::<SimdBackend, _, BitReversedOrder>::new(domain, col))
        .collect_vec())
}
