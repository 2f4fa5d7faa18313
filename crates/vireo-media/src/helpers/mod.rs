// crates/vireo-media/src/helpers/mod.rs

pub mod seek;
