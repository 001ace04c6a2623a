pub mod arena;
pub mod treap;
