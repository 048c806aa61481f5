pub mod fixtures;
pub mod processes;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use processes::*;
