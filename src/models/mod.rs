pub mod enums;
pub mod fhir;
pub mod subject;

pub use enums::*;
pub use subject::*;
