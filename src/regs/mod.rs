// Register-level access to the coprocessor request/parameter blocks.
//
// The device reads and writes its blocks in big-endian order with
// MSB-numbered bit fields. Everything here operates on plain byte
// buffers; the set of fields is data (`layout::FIELDS`), not code.
//
// - `field`  - generic (offset, width) bit access and big-endian words
// - `layout` - byte offsets and field descriptors of the CRB/CPB

pub mod field;
pub mod layout;

pub use field::{Field, Field64, get, get_bits, mask, put, put_bits};
