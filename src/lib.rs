pub mod filter;
pub mod header;
pub mod index;
pub mod line;
pub mod packet;
pub mod scanner;
pub mod types;

pub use filter::{ScanConfig, Selection};
pub use index::CallIndex;
pub use packet::PacketBuffer;
pub use scanner::{scan, LogScanner, ScanError, ScanStats};
pub use types::*;
