pub mod common;

pub mod manager_tests;
pub mod parser_tests;
