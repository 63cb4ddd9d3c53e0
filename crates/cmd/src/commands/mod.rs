pub mod archive;
pub mod audit;
pub mod lookup;
pub mod restore;
pub mod serve;

pub use archive::archive_command;
pub use audit::audit_command;
pub use lookup::lookup_command;
pub use restore::restore_command;
pub use serve::serve_command;
