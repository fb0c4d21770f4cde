//! Pipeline nodes and the catalog the engine resolves them from.
//!
//! | id | purpose |
//! |----|---------|
//! | `tokenValidateNode` | resolve the caller's token and check it belongs to its app key |
//! | `authorizationLetterValidateNode` | check the referenced authorization letter is in force |
//! | `signatureVerifyNode` | open an inbound envelope |
//! | `paramValidateNode` | run the rule tree in `validateRules` |
//! | `fieldNameConvertNode` | rename fields per `convertRules` |
//! | `signatureNode` | seal an outbound payload |
//! | `nationalNodeRequestNode` | forward to the national node |
//! | `logRecordNode` | append to the request log |
//! | `exceptionHandlerNode` | classify a failed call and halt |

pub mod authorization;
pub mod exception;
pub mod executor;
pub mod field_convert;
pub mod log_record;
pub mod national;
pub mod param_validate;
pub mod registry;
pub mod signature;
pub mod token;

pub use executor::{Node, NodeDependencies};
pub use national::{HttpNationalNodeClient, NationalNodeClient, NationalNodeConfig};
pub use registry::{create_default_registry, NodeRegistry};

#[cfg(test)]
pub(crate) mod test_support;
