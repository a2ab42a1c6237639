#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
extern crate std;

pub mod e1000;
pub mod e1000_defs;
pub mod net;
pub mod pci;
