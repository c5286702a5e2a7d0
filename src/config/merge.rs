//! Config merge policy: defaults and layer ordering.

pub mod merge_policy;
