//! # Symbol Resolution
//!
//! Turns the raw instruction pointers recorded in stacks into named
//! [`Symbol`]s.
//!
//! ## Context Markers
//!
//! Stacks are walked innermost first. Reserved marker addresses interleaved
//! in the stack announce the privilege level of the frames that follow:
//!
//! ```text
//! 0xffffffffffffff80  marker: kernel
//! 0xffffffff81a0c4f0  schedule            ─► kernel table
//! 0xfffffffffffffe00  marker: user
//! 0x55f3a2b4c780      main                ─► per-process table
//! ```
//!
//! ## Address Translation
//!
//! User addresses are runtime addresses. The process's address layout maps
//! them back to a file offset before a binary can be searched:
//!
//! ```text
//! runtime address  0x55f3a2b4c780
//! mapping          0x55f3a2b4c000 - 0x55f3a2b5f000  offset 0x1000  /usr/bin/app
//! file offset      0x55f3a2b4c780 - 0x55f3a2b4c000 + 0x1000 = 0x1780
//! ```
//!
//! The resolved range is mapped forward again, so every later address inside
//! the same function is answered from [`SymbolCache`] without another lookup.
//!
//! ## Strategies
//!
//! - [`KallsymsSymbolizer`]: kernel addresses from `/proc/kallsyms`
//! - [`ElfSymbolizer`]: user addresses from ELF symbol tables and DWARF
//! - [`JitmapSymbolizer`]: tagged JIT addresses from Jitmap records
//! - [`MultiSymbolizer`]: first hit of an ordered chain
//! - [`NoSymbolizer`]: context switches and process names only

pub mod document_symbols;
pub mod elf;
pub mod jitmap;
pub mod kallsyms;
pub mod multi;
pub mod no_op;
pub mod symbol;
pub mod symbol_cache;
pub mod symbolizer;

pub use document_symbols::DocumentSymbols;
pub use elf::ElfSymbolizer;
pub use jitmap::JitmapSymbolizer;
pub use kallsyms::KallsymsSymbolizer;
pub use multi::MultiSymbolizer;
pub use no_op::NoSymbolizer;
pub use symbol::{demangle_symbol, Symbol, SymbolKind};
pub use symbol_cache::SymbolCache;
pub use symbolizer::{SymbolRequest, Symbolizer};
