#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

pub mod hhdm;
pub mod page_alloc;

pub use page_alloc::{OwnedPage, alloc_page, free_page};
