mod service;
mod ssm;

pub use crate::provision::service::ActivationService;
pub use crate::provision::ssm::{Activation, ActivationRequest, SsmApiError, SsmService};

pub use crate::provision::ssm::SsmApi;

#[cfg(test)]
pub(crate) use crate::provision::ssm::MockSsmApi;
