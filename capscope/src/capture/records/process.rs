//! Process lifecycle records.

use capscope_common::{fork, process};

use crate::domain::Pid;

record_view! {
    /// Announces a process and its command line.
    ProcessRecord
}

record_view! {
    /// A process forked a child.
    ForkRecord
}

impl<'a> ProcessRecord<'a> {
    #[must_use]
    pub fn cmdline(&self) -> Option<&'a str> {
        self.window().cstr(process::CMDLINE)
    }
}

impl ForkRecord<'_> {
    #[must_use]
    pub fn child_pid(&self) -> Pid {
        Pid(self.window().i32(fork::CHILD_PID).unwrap_or_default())
    }
}
