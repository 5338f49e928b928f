//! Data model for the tupledb engine: typed values, composite tuple keys,
//! the total order over them, the order-preserving byte codec, scan
//! bounds, write batches, and the sorted-array primitives everything else
//! is built on.

pub mod bounds;
pub mod codec;
pub mod sorted;
pub mod subspace;
pub mod value;
pub mod writes;

pub use bounds::{Bound, Bounds, ScanArgs};
pub use codec::{decode_tuple, encode_tuple};
pub use sorted::SearchResult;
pub use value::{KeyValuePair, Tuple, Value};
pub use writes::Writes;
