// Read and read-modify-write engines.
mod read;
mod update;

pub use read::FindReader;
pub use update::{ReadAndUpdateOperation, UpdateOperationPage, UpdateSettings, UpdatedDocument};
