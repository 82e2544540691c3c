#![no_std]

pub mod hynix;
pub mod samsung;
