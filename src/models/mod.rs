pub mod context;
pub mod counter;
pub mod verdict;
