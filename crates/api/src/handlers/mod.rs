pub mod slots;
pub mod swaps;
