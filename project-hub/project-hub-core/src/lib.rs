pub mod error;
pub mod events;
pub mod ids;
pub mod import;
pub mod model;
pub mod nav;
pub mod policy;
pub mod seed;
pub mod store;
pub mod tree;
