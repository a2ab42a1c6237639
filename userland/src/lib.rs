#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
extern crate std;

pub mod apps;
pub mod syscall;
