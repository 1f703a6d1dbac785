pub mod bootstrap_tests;
