//! Built-in checks

mod data_model;
mod interface;
mod references;
mod syntax;

pub use data_model::DataModelCheck;
pub use interface::InterfaceCheck;
pub use references::ReferenceCheck;
pub use syntax::SyntaxCheck;
