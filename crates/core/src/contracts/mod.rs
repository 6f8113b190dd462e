pub mod catalog;
pub mod schema;

pub use schema::{
    json_type_name, Contract, ContractIssue, ContractViolation, Field, FieldKind, ObjectSchema,
};
