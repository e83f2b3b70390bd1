//! Leader-side implementations of the bridged services.

mod config;
mod manager;
mod profile;

pub use config::ConfigManagerImpl;
pub use manager::ServiceManagerImpl;
pub use profile::{MojangProfileSource, Profile, ProfileServiceImpl, ProfileSource};

pub(crate) use manager::find_by_owner_name;
