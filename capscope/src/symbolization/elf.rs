//! User-space symbols from ELF binaries on the analysing host.
//!
//! A runtime address is resolved in four steps:
//!
//! ```text
//! 1. address layout   0x55f3a2b4c780 → /usr/bin/app, file offset 0x1780
//! 2. mount namespace  /usr/bin/app   → candidate host paths (+ sysroot, debug dirs)
//! 3. load segments    file offset    → ELF virtual address
//! 4. symbol table     virtual addr   → name and range, else DWARF via addr2line
//! ```
//!
//! The symbol range is mapped back into runtime addresses so the document's
//! range cache can answer neighbouring addresses without asking again.

use addr2line::Context;
use anyhow::{Context as _, Result};
use gimli::{EndianArcSlice, RunTimeEndian};
use log::debug;
use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol, SymbolKind as ObjectSymbolKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::symbol::{demangle_symbol, Symbol, SymbolKind};
use super::symbolizer::{SymbolRequest, Symbolizer};
use crate::document::ProcessInfo;
use capscope_common as wire;

/// Short labels for well-known libraries, keyed by `lib*.so`.
fn library_nick(key: &str) -> Option<&'static str> {
    Some(match key {
        "libc.so" | "libstdc++.so" => "libc",
        "ld-linux-x86-64.so" => "glibc",
        "libffi.so" => "libffi",
        "libnss_sss.so" | "libnss_systemd.so" | "libssl3.so" => "NSS",
        "libpcre2-8.so" => "PCRE",
        "libselinux.so" => "SELinux",
        "libsystemd.so" => "systemd",
        "libudev.so" => "udev",
        "libxul.so" => "XUL",
        "libz.so" => "Zlib",
        "libzstd.so" => "Zstd",
        "libglib-2.0.so" => "GLib",
        "libgobject-2.0.so" => "GObject",
        "libgio-2.0.so" => "Gio",
        "libgtk-4.so" => "GTK 4",
        "libgtk-3.so" => "GTK 3",
        "libmutter-14.so" | "libmutter-cogl-14.so" | "libmutter-clutter-14.so" => "Mutter",
        "libgjs.so" | "libmozjs-115.so" => "GJS",
        "libpixman-1.so" => "Pixman",
        "libcairo.so" => "Cairo",
        "libpango-1.0.so" => "Pango",
        "libharfbuzz.so" => "Harfbuzz",
        "libEGL.so" | "libGLX.so" | "libGL.so" => "GL",
        "libwayland-client.so" | "libwayland-server.so" => "Wayland",
        _ => return None,
    })
}

/// Nick for a binary path such as `/usr/lib64/libglib-2.0.so.0.7800.0`.
fn guess_nick(path: &str) -> Option<&'static str> {
    let base = path.rsplit('/').next()?;
    let end = base.find(".so")? + 3;
    match base.as_bytes().get(end) {
        None | Some(b'.') => library_nick(&base[..end]),
        Some(_) => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct LoadSegment {
    offset: u64,
    file_size: u64,
    address: u64,
}

#[derive(Debug, Clone)]
struct ElfSymbol {
    address: u64,
    size: u64,
    name: String,
}

/// A parsed binary. Everything needed for lookups is copied out of the
/// file so the bytes can be dropped after opening.
struct ElfBinary {
    path: PathBuf,
    segments: Vec<LoadSegment>,
    /// Function symbols sorted by address.
    symbols: Vec<ElfSymbol>,
    dwarf: Option<Mutex<Context<EndianArcSlice<RunTimeEndian>>>>,
}

impl ElfBinary {
    fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path).context("Failed to read binary file")?;
        let file = object::File::parse(&*data).context("Failed to parse object file")?;

        let segments = file
            .segments()
            .map(|segment| {
                let (offset, file_size) = segment.file_range();
                LoadSegment { offset, file_size, address: segment.address() }
            })
            .filter(|s| s.file_size > 0)
            .collect();

        let mut symbols: Vec<ElfSymbol> = file
            .symbols()
            .chain(file.dynamic_symbols())
            .filter(|s| s.kind() == ObjectSymbolKind::Text && s.is_definition() && s.address() != 0)
            .filter_map(|s| {
                let name = s.name().ok()?;
                let name = if name.starts_with("_Z") || name.starts_with("_R") {
                    demangle_symbol(name)
                } else {
                    name.to_string()
                };
                Some(ElfSymbol { address: s.address(), size: s.size(), name })
            })
            .collect();
        symbols.sort_by_key(|s| s.address);
        symbols.dedup_by_key(|s| s.address);

        let endian = if file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };
        let load_section = |id: gimli::SectionId| -> Result<EndianArcSlice<RunTimeEndian>, gimli::Error> {
            let data = file
                .section_by_name(id.name())
                .and_then(|section| section.uncompressed_data().ok())
                .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
            Ok(EndianArcSlice::new(Arc::from(&*data), endian))
        };
        let dwarf = gimli::Dwarf::load(&load_section)
            .ok()
            .and_then(|dwarf| Context::from_dwarf(dwarf).ok())
            .map(Mutex::new);

        debug!(
            "Opened {} ({} symbols, {})",
            path.display(),
            symbols.len(),
            if dwarf.is_some() { "with DWARF" } else { "no DWARF" }
        );
        Ok(Self { path: path.to_path_buf(), segments, symbols, dwarf })
    }

    /// Virtual address of a file offset, through the segment containing it.
    /// Files without segments are taken as mapped at their offsets.
    fn address_for_offset(&self, offset: u64) -> Option<u64> {
        if self.segments.is_empty() {
            return Some(offset);
        }
        self.segments
            .iter()
            .find(|s| offset >= s.offset && offset - s.offset < s.file_size)
            .map(|s| s.address + (offset - s.offset))
    }

    /// Name and `[begin, end)` virtual range of the function at `address`.
    fn symbol_at(&self, address: u64) -> Option<(String, u64, u64)> {
        if let Some(index) = self.symbols.partition_point(|s| s.address <= address).checked_sub(1) {
            let symbol = &self.symbols[index];
            let end = if symbol.size > 0 {
                symbol.address + symbol.size
            } else {
                self.symbols.get(index + 1).map_or(symbol.address + 1, |next| next.address)
            };
            if address < end {
                return Some((symbol.name.clone(), symbol.address, end));
            }
        }
        self.dwarf_function_at(address).map(|name| (name, address, address + 1))
    }

    /// Outermost function DWARF knows at `address` (the one the inlined
    /// frames were inlined into).
    fn dwarf_function_at(&self, address: u64) -> Option<String> {
        let context = self.dwarf.as_ref()?.lock();
        let mut frames = context.find_frames(address).skip_all_loads().ok()?;
        let mut outermost = None;
        while let Ok(Some(frame)) = frames.next() {
            if let Some(name) = frame.function.and_then(|f| f.demangle().ok().map(|s| s.to_string())) {
                outermost = Some(name);
            }
        }
        outermost
    }
}

/// Resolves user-space addresses by opening the mapped binaries.
///
/// Binaries are looked up through the process's mount namespace, optionally
/// under a sysroot and in extra debug directories, and cached per host path.
#[derive(Default)]
pub struct ElfSymbolizer {
    sysroot: Option<PathBuf>,
    debug_dirs: Vec<PathBuf>,
    /// `None` remembers paths that failed to open.
    binaries: Mutex<HashMap<PathBuf, Option<Arc<ElfBinary>>>>,
}

impl ElfSymbolizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for binaries under `sysroot` before the host's own paths.
    #[must_use]
    pub fn with_sysroot(mut self, sysroot: impl Into<PathBuf>) -> Self {
        self.sysroot = Some(sysroot.into());
        self
    }

    /// Also look for binaries mirrored under `dir`.
    #[must_use]
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dirs.push(dir.into());
        self
    }

    /// Host paths to try for a file mapped by `process`, in order.
    fn candidates(&self, process: &ProcessInfo, file: &str) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = Vec::new();
        for translated in process.mount_namespace.translate(file) {
            let relative = translated.trim_start_matches('/');
            if let Some(sysroot) = &self.sysroot {
                out.push(sysroot.join(relative));
            }
            out.push(PathBuf::from(&translated));
            out.extend(self.debug_dirs.iter().map(|dir| dir.join(relative)));
        }
        let mut seen = std::collections::HashSet::new();
        out.retain(|p| seen.insert(p.clone()));
        out
    }

    fn load(&self, candidates: &[PathBuf]) -> Option<Arc<ElfBinary>> {
        let mut binaries = self.binaries.lock();
        for path in candidates {
            if let Some(cached) = binaries.get(path) {
                match cached {
                    Some(binary) => return Some(Arc::clone(binary)),
                    None => continue,
                }
            }
            if !path.is_file() {
                continue;
            }
            match ElfBinary::open(path) {
                Ok(binary) => {
                    let binary = Arc::new(binary);
                    binaries.insert(path.clone(), Some(Arc::clone(&binary)));
                    return Some(binary);
                }
                Err(err) => {
                    debug!("Cannot symbolize {}: {err:#}", path.display());
                    binaries.insert(path.clone(), None);
                }
            }
        }
        None
    }

    /// Number of binaries opened so far.
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.binaries.lock().values().filter(|b| b.is_some()).count()
    }
}

impl Symbolizer for ElfSymbolizer {
    fn name(&self) -> &'static str {
        "elf"
    }

    fn symbolize(&self, request: &SymbolRequest<'_>) -> Option<Symbol> {
        let address = request.address;
        if !request.is_user() || address & wire::JITMAP_ADDRESS_MASK == wire::JITMAP_ADDRESS_TAG {
            return None;
        }
        let process = request.process?;
        let mapping = process.address_layout.lookup(address)?;
        let binary = self.load(&self.candidates(process, &mapping.file))?;

        let relative = mapping.file_relative(address);
        let virtual_address = binary.address_for_offset(relative)?;
        let (name, begin, end) = binary.symbol_at(virtual_address)?;

        // Back from virtual addresses to file offsets, clamped to the mapping.
        let bias = virtual_address.wrapping_sub(relative);
        let low = mapping.file_offset;
        let high = low + mapping.range.len();
        let begin = begin.wrapping_sub(bias).clamp(low, high);
        let mut end = end.wrapping_sub(bias).clamp(low, high);
        if end == begin {
            end += 1;
        }
        let start = mapping.range.start;

        debug!("{} resolved 0x{address:x} to {name}", binary.path.display());
        Some(
            Symbol::new(name, SymbolKind::User)
                .with_path(mapping.file.as_str())
                .with_nick(guess_nick(&mapping.file).unwrap_or_default())
                .with_range(start + (begin - low), start + (end - low)),
        )
    }
}

impl std::fmt::Debug for ElfSymbolizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElfSymbolizer")
            .field("sysroot", &self.sysroot)
            .field("debug_dirs", &self.debug_dirs)
            .field("loaded", &self.loaded())
            .finish()
    }
}
