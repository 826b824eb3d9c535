//! Minimal `/proc` reader for finding a user's desktop processes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub pid: u32,
    /// Real uid from `status`
    pub uid: u32,
    /// Executable name from `comm`
    pub comm: String,
}

/// List processes under `root`, skipping entries that vanish or are unreadable.
pub fn processes(root: &Path) -> Vec<Process> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };

    let mut procs: Vec<Process> = entries
        .flatten()
        .filter_map(|entry| {
            let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
            let dir = entry.path();
            let comm = fs::read_to_string(dir.join("comm")).ok()?;
            let status = fs::read_to_string(dir.join("status")).ok()?;
            Some(Process {
                pid,
                uid: parse_uid(&status)?,
                comm: comm.trim().to_string(),
            })
        })
        .collect();
    procs.sort_by_key(|p| p.pid);
    procs
}

/// Real uid from the `Uid:` line of `/proc/<pid>/status`.
fn parse_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

/// Environment of a process (`/proc/<pid>/environ`, NUL separated).
pub fn environ(root: &Path, pid: u32) -> Option<HashMap<String, String>> {
    let raw = fs::read(root.join(pid.to_string()).join("environ")).ok()?;
    Some(
        raw.split(|b| *b == 0)
            .filter_map(|entry| {
                let entry = String::from_utf8_lossy(entry);
                let (key, value) = entry.split_once('=')?;
                Some((key.to_string(), value.to_string()))
            })
            .collect(),
    )
}

#[cfg(test)]
pub(crate) mod fixture {
    use std::fs;
    use std::path::Path;

    /// Create a fake `/proc/<pid>` entry
    pub fn add_process(root: &Path, pid: u32, uid: u32, comm: &str, environ: &[(&str, &str)]) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("comm"), format!("{comm}\n")).unwrap();
        fs::write(
            dir.join("status"),
            format!("Name:\t{comm}\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\n"),
        )
        .unwrap();
        let env: Vec<u8> = environ
            .iter()
            .flat_map(|(k, v)| format!("{k}={v}\0").into_bytes())
            .collect();
        fs::write(dir.join("environ"), env).unwrap();
    }
}
