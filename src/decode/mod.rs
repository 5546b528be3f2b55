//! Response decoding
//!
//! Path lookup into JSON response envelopes and record extraction. Records
//! are JSON objects whose schema belongs to the caller; scalars found where a
//! record was expected are wrapped as `{"value": ...}`.

mod path;
mod records;

pub use path::{extract_path, extract_path_string, extract_path_u64};
pub use records::{into_record, RecordExtractor, SCALAR_RECORD_FIELD};

#[cfg(test)]
mod tests;
