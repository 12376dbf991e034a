//! Decoder for Go's gob encoding that needs no Go type definitions: the
//! types a stream defines are recovered along with its values.
//!
//! ```no_run
//! use gobdump::{Decoder, Style};
//!
//! let file = std::fs::File::open("dump.gob")?;
//! for gob in Decoder::new(std::io::BufReader::new(file)).decode_all()? {
//!     println!("{}", gobdump::render_value(&gob.value, Style::SingleLine));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod buffer;
pub mod config;
mod decode;
pub mod display;
pub mod encode;
pub mod error;
mod gob;
pub mod registry;
mod schema;
mod session;
pub mod types;
mod value;
mod value_decoder;
pub mod varint;
mod writer;

pub use buffer::FrameCursor;
pub use config::{DecoderConfig, NamingMode};
pub use decode::{CancelToken, Decoder, GobStream, StreamItem};
pub use display::{Style, hexdump, render_type, render_types, render_value};
pub use encode::Encoder;
pub use error::{ConfigError, EncodeError, Error, ErrorKind, Result};
pub use gob::Gob;
pub use registry::{AnonNamer, SharedNamer, TypeRegistry};
pub use session::Session;
pub use types::{TypeId, WireType};
pub use value::Value;
pub use writer::GobWriter;
