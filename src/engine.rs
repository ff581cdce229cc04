//! Placeholder normalization and template fill engine.
//!
//! ## How the parts work together
//!
//! ```text
//! descriptors ──┐
//!               │  Matcher::boundary_tolerant        (matcher.rs)
//!               └───────────────┬──────────────
//!                               │
//! representations ──────────────┼─ normalize          (normalize.rs)
//!                               │    - strict match, then flexible fallback
//!                               │      (never on packaged markup)
//!                               │    - bounded_replace (replace.rs)
//!                               v
//!                     normalized representations
//!                               │
//!                     extract (extract.rs + rules.rs)
//!                       - four scans, merged and position-sorted
//!                       - representation-scoped IDs
//!                               │
//!                     map_slots (mapper.rs)
//!                       - fixed-size batches, per-batch timeout
//!                       - failed batches contribute nothing
//!                               │
//!                               v
//!                     fill_slots + fill_markers (rehydrate.rs)
//!                       - right-to-left span edits
//!                       - escape_for (escape.rs)
//!                               │
//!                               v
//!                      filled representations
//! ```
//!
//! Everything here works on one document at a time and owns no shared state.
//! The only `async` entry point is [`map_slots`], because it talks to an
//! external oracle.
//!
//! ## Responsibilities by module
//!
//! - `matcher.rs`: literal → boundary-tolerant regex; pure `find` functions.
//! - `extract.rs`: occurrence (slot) discovery and ID assignment.
//! - `replace.rs`: bounded leftmost replacement and right-to-left splicing.
//! - `normalize.rs`: descriptor-driven normalization across representations.
//! - `mapper.rs`: batching/merge contract for the resolution oracle.
//! - `escape.rs`: representation-specific value escaping.
//! - `rehydrate.rs`: span and marker substitution of final values.
//! - `metrics.rs`: per-stage reports.

#[path = "engine/escape.rs"]
mod escape;
#[path = "engine/extract.rs"]
mod extract;
#[path = "engine/mapper.rs"]
mod mapper;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/normalize.rs"]
mod normalize;
#[path = "engine/rehydrate.rs"]
mod rehydrate;
#[path = "engine/replace.rs"]
mod replace;


pub use escape::escape_for;
pub use extract::extract;
pub use mapper::{FieldView, MappingBatch, SlotView, map_slots};
pub use matcher::Matcher;
pub use metrics::{BatchOutcome, DescriptorOutcome, FillReport, MappingReport, NormalizeReport, SkipReason};
pub use normalize::normalize;
pub use rehydrate::{fill_markers, fill_slots};
pub use replace::bounded_replace;

pub(crate) use escape::escape_text;
pub(crate) use extract::extract_all;
pub(crate) use rehydrate::values_by_id;
