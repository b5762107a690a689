/*
[INPUT]:  Wallet payload definitions and serde requirements
[OUTPUT]: Typed Rust structs/enums with serialization support
[POS]:    Data layer - type definitions shared by strategies and manager
[UPDATE]: When payload shapes change or new types added
*/

pub mod enums;
pub mod models;

pub use enums::*;
pub use models::*;
