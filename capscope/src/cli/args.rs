//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "capscope",
    about = "Inspect and analyze sysprof-style capture files",
    after_help = "\
EXAMPLES:
    capscope trace.syscap                         Summary of the capture
    capscope trace.syscap --marks --counters      Mark catalog and counters
    capscope trace.syscap --cat /proc/cpuinfo     Print an embedded file
    capscope trace.syscap --hotspots 20           Hottest functions (symbolized)
    capscope trace.syscap --export trace.json     Chrome trace of marks/counters/logs"
)]
pub struct Args {
    /// Capture file to open
    #[arg(value_name = "CAPTURE")]
    pub capture: PathBuf,

    /// Print header, time span and record counts (default when nothing else is asked)
    #[arg(long)]
    pub summary: bool,

    /// Print mark statistics per group and name
    #[arg(long)]
    pub marks: bool,

    /// Print counters with their value ranges
    #[arg(long)]
    pub counters: bool,

    /// Print processes with their command lines and mappings
    #[arg(long)]
    pub processes: bool,

    /// List embedded files
    #[arg(long)]
    pub files: bool,

    /// Write an embedded file to stdout
    #[arg(long, value_name = "PATH")]
    pub cat: Option<String>,

    /// Print the aggregated call tree
    #[arg(long)]
    pub callgraph: bool,

    /// Print the N hottest functions
    #[arg(long, value_name = "N")]
    pub hotspots: Option<usize>,

    /// Resolve kernel addresses from the capture's /proc/kallsyms
    #[arg(long)]
    pub kallsyms: bool,

    /// Look for binaries under DIR before the host's own paths
    #[arg(long, value_name = "DIR")]
    pub sysroot: Option<PathBuf>,

    /// Extra directory mirroring binaries with debug symbols (repeatable)
    #[arg(long = "debug-dir", value_name = "DIR")]
    pub debug_dirs: Vec<PathBuf>,

    /// Callgraph with innermost frames at the root
    #[arg(long)]
    pub bottom_up: bool,

    /// Insert a node per thread under each process
    #[arg(long)]
    pub threads: bool,

    /// Skip frames from /usr/lib and /lib
    #[arg(long)]
    pub hide_system_libraries: bool,

    /// Limit the printed call tree to this depth
    #[arg(long, value_name = "N", default_value = "12")]
    pub depth: usize,

    /// Export marks, counters and logs as Chrome Trace JSON
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Copy the capture to FILE
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// Report loading and symbolizing progress on stderr
    #[arg(long)]
    pub progress: bool,
}

impl Args {
    /// Whether any stack-based output was requested.
    #[must_use]
    pub fn wants_symbols(&self) -> bool {
        self.callgraph || self.hotspots.is_some()
    }

    /// Whether anything besides the summary was requested.
    #[must_use]
    pub fn wants_details(&self) -> bool {
        self.marks
            || self.counters
            || self.processes
            || self.files
            || self.cat.is_some()
            || self.wants_symbols()
            || self.export.is_some()
            || self.save.is_some()
    }
}
