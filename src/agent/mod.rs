mod cleaner;
mod identity;
mod register;
mod registration_record;

pub use crate::agent::cleaner::{CleanerError, RegistrationCleaner};
pub use crate::agent::identity::{persist_identity, IdentityError};
pub use crate::agent::register::{register_agent, RegisterError};
pub use crate::agent::registration_record::RegistrationRecordError;
