/*!
 * Stream Adapters
 * Byte streams that translate reads/writes into lease operations
 */

mod reader;
mod writer;

pub use reader::PoolReader;
pub use writer::PoolWriter;

/// Optional observer invoked after a stream has released its lease and token
pub(crate) type CloseObserver = Box<dyn FnOnce() + Send>;
