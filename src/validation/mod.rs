//! Declarative, recursive validation of untrusted input.
//!
//! A rule tree is a list of [`FieldRule`]s. Each resolves a dotted path into
//! the target and applies its [`RuleSpec`]s in order; `dataType` rules with
//! nested rules descend into arrays (`name[i]`), objects (`name.field`) and
//! JSON strings once every rule at the current level has passed.

pub mod engine;
pub mod path;
pub mod registry;
pub mod rule;
pub mod validators;

pub use engine::{FailureKind, ValidationEngine, ValidationFailure};
pub use path::resolve_path;
pub use registry::{create_default_validators, ValidatorRegistry};
pub use rule::{parse_rules, FieldRule, RuleSpec};
pub use validators::{
    DataTypeValidator, ParamValidator, RegexValidator, RequiredValidator, StringLengthValidator,
};
