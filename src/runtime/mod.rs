pub mod builtins;
pub mod env;
pub mod frame;
pub mod runtime_error;
pub mod vm_ast;
pub mod vm_bc;

pub use vm_ast::VmAst;
pub use vm_bc::VmBc;
