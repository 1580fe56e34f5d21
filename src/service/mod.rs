//! CrudService: generic resource operations over any repository.

mod crud;
mod validation;
pub use crud::{CrudService, UpdateMode};
pub use validation::{NoopValidator, RuleValidator, ValidationErrors, Validator};
