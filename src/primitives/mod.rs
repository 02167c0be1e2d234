//! Value types and scratch state shared by the binders, the decoder and the gate.
pub mod pool;
pub mod values;

pub mod prelude {
    pub use super::pool::{Pool, Pooled, Recycle};
    pub use super::values::{FileHeader, Files, Multimap, MultipartForm, Values};
}
