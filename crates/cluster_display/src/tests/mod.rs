//! Cross-module integration tests

mod lockstep;
