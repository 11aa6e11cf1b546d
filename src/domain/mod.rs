pub mod error;
pub mod hash;
pub mod header;
pub mod proof;
pub mod tree;
