pub mod robot;
pub mod rules;
