use std::collections::HashMap;
use std::sync::Arc;

use super::validators::{
    DataTypeValidator, ParamValidator, RegexValidator, RequiredValidator, StringLengthValidator,
};

/// Parameter validators keyed by type name.
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn ParamValidator>>,
}

impl ValidatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        ValidatorRegistry {
            validators: HashMap::new(),
        }
    }

    /// Register a validator under `validator_type()`.
    pub fn register(&mut self, validator: Arc<dyn ParamValidator>) {
        self.validators
            .insert(validator.validator_type().to_string(), validator);
    }

    pub fn get(&self, validator_type: &str) -> Option<Arc<dyn ParamValidator>> {
        self.validators.get(validator_type).cloned()
    }

    /// All registered validator types.
    pub fn registered_types(&self) -> Vec<String> {
        self.validators.keys().cloned().collect()
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        create_default_validators()
    }
}

/// Registry with the built-in `required`, `regex`, `stringLength` and
/// `dataType` validators.
pub fn create_default_validators() -> ValidatorRegistry {
    let mut registry = ValidatorRegistry::new();
    registry.register(Arc::new(RequiredValidator));
    registry.register(Arc::new(RegexValidator::new()));
    registry.register(Arc::new(StringLengthValidator));
    registry.register(Arc::new(DataTypeValidator));
    registry
}
