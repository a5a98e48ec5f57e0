pub mod envelope;
pub mod record;
pub mod sync;
pub mod task;

pub use envelope::*;
pub use record::*;
pub use sync::*;
pub use task::*;
