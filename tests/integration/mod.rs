//! End-to-end scenarios modelled on the edits a code generator makes to an
//! Angular workspace: registering routes, importing modules, adding class
//! members and locating the module a new file belongs to.

mod modules;
mod recipes;

use schematic_patcher::host::{Host, MemoryHost};
use std::path::Path;

pub fn host_with(files: &[(&str, &str)]) -> MemoryHost {
    let mut host = MemoryHost::new();
    for (path, text) in files {
        host.insert(path, *text);
    }
    host
}

pub fn read(host: &MemoryHost, path: &str) -> String {
    host.read(Path::new(path))
        .unwrap()
        .unwrap_or_else(|| panic!("{path} missing from host"))
}
