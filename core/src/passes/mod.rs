//! The semantic pipeline stages that run, in order, between parsing and
//! codegen (spec.md §2 "Data flow").

pub mod constfold;
pub mod deadcode;
pub mod reorder;
pub mod resolve;
pub mod typecheck;
