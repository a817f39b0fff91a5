//! Runtime value type shared by facts, documents and results

pub mod value;

pub use value::Value;
